use serde::{Deserialize, Serialize};

/// Configuration of the provider client: credentials, default role, default
/// region, profile. Opaque to the engine except for override-merge — the
/// engine never interprets these fields itself, it only merges a
/// CLI-supplied `--profile` override over the declared value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProvisionerConfig {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl ProvisionerConfig {
    /// Overlay a CLI-supplied `--profile` onto the declared provisioner
    /// config, leaving every other field untouched.
    pub fn with_profile_override(mut self, profile: Option<String>) -> Self {
        if let Some(profile) = profile {
            self.profile = Some(profile);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_override_replaces_only_profile() {
        let base = ProvisionerConfig {
            profile: Some("declared".into()),
            role_name: Some("OrganizationAccountAccessRole".into()),
            ..Default::default()
        };
        let merged = base.with_profile_override(Some("cli-override".into()));
        assert_eq!(merged.profile.as_deref(), Some("cli-override"));
        assert_eq!(
            merged.role_name.as_deref(),
            Some("OrganizationAccountAccessRole")
        );
    }

    #[test]
    fn no_override_keeps_declared_profile() {
        let base = ProvisionerConfig {
            profile: Some("declared".into()),
            ..Default::default()
        };
        let merged = base.clone().with_profile_override(None);
        assert_eq!(merged, base);
    }
}
