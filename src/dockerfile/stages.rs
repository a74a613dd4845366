//! `FROM` stage references, alias resolution and upstream image parsing

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::{Dockerfile, Instruction};
use crate::util::OrderedSet;
use crate::validation::ValidationError;

pub const LOCAL_REGISTRY_HOST: &str = "localhost";

/// One `FROM` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReference {
    pub image: String,
    pub stage: Option<String>,
    pub platform: Option<String>,
    #[serde(skip)]
    pub line: usize,
}

impl StageReference {
    /// `FROM [--platform=VALUE] IMAGE [AS ALIAS]`. `None` when the image is missing.
    fn from_instruction(instruction: &Instruction) -> Option<Self> {
        let mut tokens = instruction.value.split_whitespace().peekable();

        let platform = match tokens.peek() {
            Some(token) if token.starts_with("--platform=") => {
                let value = token.trim_start_matches("--platform=").to_string();
                tokens.next();
                Some(value)
            }
            _ => None,
        };

        let image = tokens.next()?.to_string();
        let stage = match (tokens.next(), tokens.next()) {
            (Some(keyword), Some(alias)) if keyword.eq_ignore_ascii_case("as") => {
                Some(alias.to_string())
            }
            _ => None,
        };

        Some(Self {
            image,
            stage,
            platform,
            line: instruction.line,
        })
    }

    pub fn has_variable(&self) -> bool {
        self.image.contains('$')
    }
}

/// Image a base-image mirror tracks, taken from its first `FROM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamImage {
    pub upstream_image: String,
    /// Repository path without registry host and tag (`grafana/grafana`)
    pub image_name: String,
    pub version_tag: Option<String>,
}

impl UpstreamImage {
    pub fn parse(image: &str) -> Option<Self> {
        let image = image.trim();
        if image.is_empty() {
            return None;
        }

        let without_host = match image.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => rest,
            _ => image,
        };

        // Digest references keep the digest out of the name
        let without_digest = without_host.split('@').next().unwrap_or(without_host);

        let (image_name, version_tag) = match without_digest.rsplit_once(':') {
            Some((name, tag)) if !tag.is_empty() && !tag.contains('/') => {
                (name.to_string(), Some(tag.to_string()))
            }
            _ => (without_digest.to_string(), None),
        };

        Some(Self {
            upstream_image: image.to_string(),
            image_name,
            version_tag,
        })
    }
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == LOCAL_REGISTRY_HOST
}

impl Dockerfile {
    pub fn stage_references(&self) -> Vec<StageReference> {
        self.instructions()
            .iter()
            .filter(|i| i.is("FROM"))
            .filter_map(StageReference::from_instruction)
            .collect()
    }

    /// Instructions belonging to the final build stage.
    ///
    /// Everything after the last well-formed `FROM`; the whole file when
    /// there is none.
    pub fn final_stage(&self) -> &[Instruction] {
        let instructions = self.instructions();
        let start = instructions
            .iter()
            .rposition(|i| i.is("FROM") && StageReference::from_instruction(i).is_some())
            .map(|idx| idx + 1)
            .unwrap_or(0);
        &instructions[start..]
    }

    pub fn final_stage_base(&self) -> Option<String> {
        let references = self.stage_references();
        let last = references.last()?;

        let aliases: BTreeMap<&str, &str> = references
            .iter()
            .filter_map(|r| r.stage.as_deref().map(|alias| (alias, r.image.as_str())))
            .collect();

        let mut current = last.image.as_str();
        let mut visited = HashSet::new();
        while let Some(&next) = aliases.get(current) {
            if !visited.insert(current) {
                break;
            }
            current = next;
        }

        Some(current.to_string())
    }

    /// Stage aliases defined anywhere in the file, lower-cased.
    pub fn stage_aliases(&self) -> HashSet<String> {
        self.stage_references()
            .into_iter()
            .filter_map(|r| r.stage)
            .map(|alias| alias.to_ascii_lowercase())
            .collect()
    }

    pub fn external_copy_sources(&self) -> Vec<String> {
        let aliases = self.stage_aliases();
        let mut sources = OrderedSet::new();

        for instruction in self.instructions() {
            if !(instruction.is("COPY") || instruction.is("ADD")) {
                continue;
            }
            let Some(source) = copy_from_value(&instruction.value) else {
                continue;
            };
            let is_stage_index = source.chars().all(|c| c.is_ascii_digit());
            if is_stage_index || aliases.contains(&source.to_ascii_lowercase()) {
                continue;
            }
            sources.insert(source.to_string());
        }

        sources.into_vec()
    }

    pub fn validate_no_variable_in_stage_reference(&self) -> Result<(), ValidationError> {
        match self.stage_references().into_iter().find(|r| r.has_variable()) {
            Some(reference) => Err(ValidationError::VariableInFrom {
                image: reference.image,
                line: reference.line,
            }),
            None => Ok(()),
        }
    }

    pub fn upstream(&self) -> Option<UpstreamImage> {
        let first = self.stage_references().into_iter().next()?;
        UpstreamImage::parse(&first.image)
    }
}

fn copy_from_value(value: &str) -> Option<&str> {
    value
        .split_whitespace()
        .take_while(|token| token.starts_with("--"))
        .find_map(|token| token.strip_prefix("--from="))
        .filter(|source| !source.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::{
        external_copy_sources, final_stage_base, parse_stage_references, parse_upstream,
        validate_no_variable_in_stage_reference,
    };
    use yare::parameterized;

    #[test]
    fn test_single_stage() {
        let refs = parse_stage_references(
            "FROM ghcr.io/groupsky/homy/node:18.20.8-alpine\nWORKDIR /app\n",
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].image, "ghcr.io/groupsky/homy/node:18.20.8-alpine");
        assert_eq!(refs[0].stage, None);
        assert_eq!(refs[0].platform, None);
    }

    #[test]
    fn test_platform_and_alias() {
        let refs = parse_stage_references(
            "FROM --platform=linux/amd64 ghcr.io/groupsky/homy/node:18.20.8-alpine AS base\n",
        );
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].image, "ghcr.io/groupsky/homy/node:18.20.8-alpine");
        assert_eq!(refs[0].stage.as_deref(), Some("base"));
        assert_eq!(refs[0].platform.as_deref(), Some("linux/amd64"));
    }

    #[test]
    fn test_lowercase_keyword_and_alias_marker() {
        let refs = parse_stage_references("from ghcr.io/groupsky/homy/node:18.20.8-alpine as base");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].stage.as_deref(), Some("base"));
    }

    #[test]
    fn test_malformed_from_is_skipped() {
        let refs = parse_stage_references("FROM\nFROM ghcr.io/groupsky/homy/node:18.20.8-alpine\n");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].image, "ghcr.io/groupsky/homy/node:18.20.8-alpine");
        assert_eq!(refs[0].line, 2);
    }

    #[test]
    fn test_dangling_as_has_no_alias() {
        let refs = parse_stage_references("FROM alpine:3.19 AS\n");
        assert_eq!(refs[0].stage, None);
    }

    #[test]
    fn test_final_stage_base_follows_alias_chain() {
        let text = "FROM ghcr.io/groupsky/homy/alpine:3.22.1 AS stage1\n\
                    FROM stage1 AS stage2\n\
                    FROM stage2 AS stage3\n\
                    FROM stage3 AS final\n";
        assert_eq!(
            final_stage_base(text).as_deref(),
            Some("ghcr.io/groupsky/homy/alpine:3.22.1")
        );
    }

    #[test]
    fn test_final_stage_base_returns_last_external_image() {
        let text = "FROM ghcr.io/groupsky/homy/node:18.20.8-alpine AS build\n\
                    RUN npm ci\n\
                    FROM ghcr.io/groupsky/homy/grafana:9.5.21\n\
                    COPY --from=build /app /app\n";
        assert_eq!(
            final_stage_base(text).as_deref(),
            Some("ghcr.io/groupsky/homy/grafana:9.5.21")
        );
    }

    #[test]
    fn test_final_stage_base_terminates_on_cycle() {
        let text = "FROM b AS a\nFROM a AS b\nFROM b\n";
        let base = final_stage_base(text);
        assert!(matches!(base.as_deref(), Some("a") | Some("b")));
    }

    #[test]
    fn test_final_stage_base_self_alias() {
        assert_eq!(final_stage_base("FROM x AS x\n").as_deref(), Some("x"));
    }

    #[test]
    fn test_final_stage_without_from_is_whole_file() {
        let dockerfile = Dockerfile::parse("LABEL a=b\nHEALTHCHECK CMD true\n");
        assert_eq!(dockerfile.final_stage().len(), 2);
    }

    #[test]
    fn test_final_stage_starts_after_last_from() {
        let dockerfile = Dockerfile::parse("FROM a AS one\nRUN x\nFROM one\nRUN y\nCMD z\n");
        let keywords: Vec<_> = dockerfile
            .final_stage()
            .iter()
            .map(|i| i.keyword.as_str())
            .collect();
        assert_eq!(keywords, vec!["RUN", "CMD"]);
    }

    #[test]
    fn test_external_copy_sources() {
        let text = "FROM ghcr.io/groupsky/homy/alpine:3.22.1\n\
                    COPY --from=ghcr.io/groupsky/homy/node:18.20.8-alpine /usr/local/bin/node /usr/local/bin/\n\
                    COPY --from=ghcr.io/groupsky/homy/python:3.11-alpine /usr/local/bin/python3 /usr/local/bin/\n\
                    COPY --from=ghcr.io/groupsky/homy/node:18.20.8-alpine /usr/lib /usr/lib\n";
        assert_eq!(
            external_copy_sources(text),
            vec![
                "ghcr.io/groupsky/homy/node:18.20.8-alpine".to_string(),
                "ghcr.io/groupsky/homy/python:3.11-alpine".to_string(),
            ]
        );
    }

    #[test]
    fn test_internal_copy_sources_are_ignored() {
        let text = "FROM node:18 AS Build\nRUN npm ci\n\
                    FROM node:18\n\
                    COPY --from=build /app/dist ./dist\n\
                    COPY --from=0 /app/package.json ./\n\
                    COPY --chown=node:node ./src ./src\n\
                    ADD --from=Build /a /b\n";
        assert!(external_copy_sources(text).is_empty());
    }

    #[test]
    fn test_copy_from_flag_after_other_flags() {
        let text = "FROM alpine:3.19\nCOPY --chown=1000:1000 --from=busybox:1.36 /bin/busybox /bin/\n";
        assert_eq!(external_copy_sources(text), vec!["busybox:1.36".to_string()]);
    }

    #[test]
    fn test_variable_in_from_rejected() {
        let text = "ARG BASE_IMAGE=alpine:3.19\nFROM ${BASE_IMAGE}\n";
        let err = validate_no_variable_in_stage_reference(text).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ARG"));
        assert!(message.contains("FROM"));
        assert!(message.to_lowercase().contains("variable"));
    }

    #[test]
    fn test_dollar_in_image_name_rejected() {
        let text = "FROM ghcr.io/groupsky/homy/$IMAGE:latest\n";
        assert!(validate_no_variable_in_stage_reference(text).is_err());
    }

    #[test]
    fn test_arg_used_elsewhere_allowed() {
        let text = "FROM ghcr.io/groupsky/homy/node:18.20.8-alpine\n\
                    ARG NODE_ENV=production\n\
                    ENV NODE_ENV=${NODE_ENV}\n\
                    RUN echo $NODE_ENV\n";
        assert!(validate_no_variable_in_stage_reference(text).is_ok());
    }

    #[parameterized(
        plain = { "node:18.20.8-alpine3.21", "node", Some("18.20.8-alpine3.21") },
        registry_host = { "docker.io/grafana/grafana:9.5.21", "grafana/grafana", Some("9.5.21") },
        no_tag = { "alpine", "alpine", None },
        org_without_host = { "grafana/grafana:9.5.21", "grafana/grafana", Some("9.5.21") },
        host_with_port = { "registry:5000/team/app:1.2", "team/app", Some("1.2") },
        localhost = { "localhost/app:dev", "app", Some("dev") },
        digest = { "alpine@sha256:abcdef", "alpine", None },
    )]
    fn test_upstream_image(image: &str, name: &str, tag: Option<&str>) {
        let upstream = UpstreamImage::parse(image).unwrap();
        assert_eq!(upstream.upstream_image, image);
        assert_eq!(upstream.image_name, name);
        assert_eq!(upstream.version_tag.as_deref(), tag);
    }

    #[test]
    fn test_upstream_uses_first_from() {
        let text = "FROM influxdb:1.8.10 AS upstream\nFROM alpine:3.19\nCOPY --from=upstream / /\n";
        let upstream = parse_upstream(text).unwrap();
        assert_eq!(upstream.upstream_image, "influxdb:1.8.10");
        assert_eq!(upstream.image_name, "influxdb");
        assert_eq!(upstream.version_tag.as_deref(), Some("1.8.10"));
    }
}
