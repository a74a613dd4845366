//! `HEALTHCHECK` detection and parameter extraction

use serde::Serialize;

use super::Dockerfile;

/// Options and command of a `HEALTHCHECK` instruction. Unset options stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthCheckParams {
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub start_period: Option<String>,
    pub start_interval: Option<String>,
    pub retries: Option<String>,
    pub cmd: String,
}

impl HealthCheckParams {
    /// Parses the value of a `HEALTHCHECK` instruction. `None` when the whole
    /// value is `NONE`.
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("NONE") {
            return None;
        }
        let tokens = tokenize_quoted(value);

        let mut params = Self::default();
        let mut implicit = Vec::new();
        let mut iter = tokens.into_iter();

        while let Some(token) = iter.next() {
            if token.eq_ignore_ascii_case("CMD") {
                params.cmd = iter.collect::<Vec<_>>().join(" ");
                return Some(params);
            }
            match token.strip_prefix("--").and_then(|flag| flag.split_once('=')) {
                Some((name, value)) => params.set_option(name, value),
                None => implicit.push(token),
            }
        }

        params.cmd = implicit.join(" ");
        Some(params)
    }

    fn set_option(&mut self, name: &str, value: &str) {
        let slot = match name {
            "interval" => &mut self.interval,
            "timeout" => &mut self.timeout,
            "start-period" => &mut self.start_period,
            "start-interval" => &mut self.start_interval,
            "retries" => &mut self.retries,
            _ => return,
        };
        *slot = Some(value.to_string());
    }
}

/// Splits on whitespace, keeping single- or double-quoted spans intact.
///
/// Quote characters stay in the token so the command reads as written. An
/// unterminated quote runs to the end of the input.
pub fn tokenize_quoted(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match quote {
            Some(open) => {
                current.push(c);
                if c == open {
                    quote = None;
                }
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                current.push(c);
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

impl Dockerfile {
    /// Last `HEALTHCHECK` of the final stage, `None` when absent or disabled.
    pub fn health_check_params(&self) -> Option<HealthCheckParams> {
        self.final_stage()
            .iter()
            .rev()
            .find(|i| i.is("HEALTHCHECK"))
            .and_then(|i| HealthCheckParams::parse(&i.value))
    }

    pub fn has_health_check(&self) -> bool {
        self.health_check_params().is_some()
    }
}
