//! Driver configuration.
use tensil_data::internal::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceConfig {
    /// Forward passes over the graph before giving up on a fixed point.
    pub max_passes: usize,
    /// Run the canonicalization hook of every op once before inference.
    pub canonicalize: bool,
    /// Run `verify` before `infer_shapes`, and again after it changed a
    /// result type.
    pub verify: bool,
}

impl Default for InferenceConfig {
    fn default() -> InferenceConfig {
        InferenceConfig { max_passes: 4, canonicalize: true, verify: true }
    }
}

impl InferenceConfig {
    /// Defaults, overridden by `TENSIL_MAX_PASSES`, `TENSIL_CANONICALIZE`
    /// and `TENSIL_VERIFY`.
    pub fn from_env() -> TensilResult<InferenceConfig> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TensilResult<InferenceConfig> {
        let mut config = InferenceConfig::default();
        if let Some(passes) = lookup("TENSIL_MAX_PASSES") {
            config.max_passes = passes
                .trim()
                .parse()
                .with_context(|| format!("Parsing TENSIL_MAX_PASSES={passes:?}"))?;
            ensure!(config.max_passes > 0, "TENSIL_MAX_PASSES must be at least 1");
        }
        if let Some(flag) = lookup("TENSIL_CANONICALIZE") {
            config.canonicalize = parse_flag("TENSIL_CANONICALIZE", &flag)?;
        }
        if let Some(flag) = lookup("TENSIL_VERIFY") {
            config.verify = parse_flag("TENSIL_VERIFY", &flag)?;
        }
        Ok(config)
    }

    pub fn with_max_passes(self, max_passes: usize) -> InferenceConfig {
        InferenceConfig { max_passes, ..self }
    }

    pub fn with_canonicalize(self, canonicalize: bool) -> InferenceConfig {
        InferenceConfig { canonicalize, ..self }
    }

    pub fn with_verify(self, verify: bool) -> InferenceConfig {
        InferenceConfig { verify, ..self }
    }
}

fn parse_flag(name: &str, value: &str) -> TensilResult<bool> {
    match &*value.trim().to_ascii_lowercase() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{name}={value:?} is not a boolean"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> TensilResult<InferenceConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        InferenceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        assert_eq!(config(&[]).unwrap(), InferenceConfig::default());
    }

    #[test]
    fn overrides() {
        let c = config(&[("TENSIL_MAX_PASSES", "8"), ("TENSIL_VERIFY", "Off")]).unwrap();
        assert_eq!(c, InferenceConfig::default().with_max_passes(8).with_verify(false));
        assert!(config(&[("TENSIL_CANONICALIZE", "maybe")]).is_err());
        assert!(config(&[("TENSIL_MAX_PASSES", "0")]).is_err());
        assert!(config(&[("TENSIL_MAX_PASSES", "lots")]).is_err());
    }
}
