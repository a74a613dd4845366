//! Dockerfile instruction model
//!
//! Parses build-file text into logical instructions and answers the
//! questions change detection needs: which images a build starts from, what
//! the final stage ultimately runs on, whether the final stage declares a
//! health check, which external images are copied from, and which upstream
//! image a base-image mirror tracks.
//!
//! Parsing never fails. Empty input yields empty answers and malformed
//! instructions are skipped.
//!
//! # Example
//!
//! ```
//! use buildscope::dockerfile::Dockerfile;
//!
//! let dockerfile = Dockerfile::parse(
//!     "FROM ghcr.io/groupsky/homy/node:18.20.8-alpine AS base\n\
//!      FROM base AS RELEASE\n\
//!      HEALTHCHECK CMD node healthcheck.js\n",
//! );
//!
//! assert_eq!(dockerfile.stage_references().len(), 2);
//! assert_eq!(
//!     dockerfile.final_stage_base().as_deref(),
//!     Some("ghcr.io/groupsky/homy/node:18.20.8-alpine")
//! );
//! assert!(dockerfile.has_health_check());
//! ```

mod healthcheck;
mod instructions;
mod stages;

pub use healthcheck::{tokenize_quoted, HealthCheckParams};
pub use instructions::{parse_instructions, Instruction};
pub use stages::{StageReference, UpstreamImage, LOCAL_REGISTRY_HOST};

use crate::validation::ValidationError;

/// A parsed Dockerfile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dockerfile {
    instructions: Vec<Instruction>,
}

impl Dockerfile {
    pub fn parse(text: &str) -> Self {
        Self {
            instructions: parse_instructions(text),
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// All `FROM` references in file order. The last entry is the final stage.
pub fn parse_stage_references(text: &str) -> Vec<StageReference> {
    Dockerfile::parse(text).stage_references()
}

/// Image the final stage ultimately builds on, following stage aliases.
pub fn final_stage_base(text: &str) -> Option<String> {
    Dockerfile::parse(text).final_stage_base()
}

/// Whether the final stage declares an enabled `HEALTHCHECK`.
pub fn has_health_check(text: &str) -> bool {
    Dockerfile::parse(text).has_health_check()
}

/// Parameters of the final stage's `HEALTHCHECK`, if any.
pub fn parse_health_check_params(text: &str) -> Option<HealthCheckParams> {
    Dockerfile::parse(text).health_check_params()
}

/// Unique `COPY --from=` sources that are not stages of the same file.
pub fn external_copy_sources(text: &str) -> Vec<String> {
    Dockerfile::parse(text).external_copy_sources()
}

/// Rejects `FROM` images that depend on variable substitution.
pub fn validate_no_variable_in_stage_reference(text: &str) -> Result<(), ValidationError> {
    Dockerfile::parse(text).validate_no_variable_in_stage_reference()
}

/// Upstream image of a base-image mirror, keyed off its first `FROM`.
pub fn parse_upstream(text: &str) -> Option<UpstreamImage> {
    Dockerfile::parse(text).upstream()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTOMATIONS: &str = r#"#### Stage BASE ####
FROM ghcr.io/groupsky/homy/node:18.20.8-alpine AS base

# Install tools, create app dir, add user and set rights
RUN set -ex && \
    mkdir -p /usr/src/app && \
    adduser -h /usr/src/app -D -H node-app -u 1000 && \
    chown -R node-app:node-app /usr/src/app

WORKDIR /usr/src/app
COPY package*.json ./

#### Stage BUILD ####
FROM base AS build

RUN apk add --no-cache --virtual buildtools build-base python3 && \
    npm ci --omit=dev && \
    cp -R node_modules prod_node_modules

#### Stage RELEASE ####
FROM base AS RELEASE

ENV NODE_OPTIONS="--unhandled-rejections=strict"
COPY --from=build /usr/src/app/prod_node_modules ./node_modules
COPY . .

USER node-app
ENTRYPOINT ["node", "index.js"]
"#;

    const TELEGRAM_BRIDGE: &str = r#"FROM ghcr.io/groupsky/homy/node:18.20.8-alpine

WORKDIR /usr/src/app
COPY package*.json ./
RUN npm ci --omit=dev
COPY . .

HEALTHCHECK --interval=30s --timeout=10s --start-period=5s --retries=3 \
  CMD node -e "require('http').get('http://localhost:3000/health', (res) => process.exit(res.statusCode === 200 ? 0 : 1)).on('error', () => process.exit(1))"

EXPOSE 3000
CMD ["node", "index.js"]
"#;

    #[test]
    fn test_real_multi_stage_service() {
        let refs = parse_stage_references(AUTOMATIONS);
        let stages: Vec<_> = refs.iter().map(|r| r.stage.as_deref()).collect();
        assert_eq!(stages, vec![Some("base"), Some("build"), Some("RELEASE")]);

        assert_eq!(
            final_stage_base(AUTOMATIONS).as_deref(),
            Some("ghcr.io/groupsky/homy/node:18.20.8-alpine")
        );
        assert!(!has_health_check(AUTOMATIONS));
        assert!(external_copy_sources(AUTOMATIONS).is_empty());
        assert!(validate_no_variable_in_stage_reference(AUTOMATIONS).is_ok());
    }

    #[test]
    fn test_real_service_with_health_check() {
        assert_eq!(parse_stage_references(TELEGRAM_BRIDGE).len(), 1);
        assert!(has_health_check(TELEGRAM_BRIDGE));

        let params = parse_health_check_params(TELEGRAM_BRIDGE).unwrap();
        assert_eq!(params.interval.as_deref(), Some("30s"));
        assert_eq!(params.timeout.as_deref(), Some("10s"));
        assert_eq!(params.start_period.as_deref(), Some("5s"));
        assert_eq!(params.retries.as_deref(), Some("3"));
        assert!(params.cmd.starts_with("node -e \"require('http')"));
        assert!(params.cmd.ends_with("process.exit(1))\""));
    }

    #[test]
    fn test_empty_input_everywhere() {
        for text in ["", "   \n\n  "] {
            assert!(parse_stage_references(text).is_empty());
            assert_eq!(final_stage_base(text), None);
            assert!(!has_health_check(text));
            assert_eq!(parse_health_check_params(text), None);
            assert!(external_copy_sources(text).is_empty());
            assert!(validate_no_variable_in_stage_reference(text).is_ok());
            assert_eq!(parse_upstream(text), None);
        }
    }
}
