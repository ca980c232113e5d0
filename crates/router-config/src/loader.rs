use std::path::Path;

use crate::ConfigSnapshot;

impl ConfigSnapshot {
    /// Load a configuration snapshot from a TOML file.
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result. This is the core's only
    /// file-parsing responsibility — everything else about ingress
    /// (sockets, CLI flags) belongs to the hosting program.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration snapshot is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns an error if a virtual model names an unknown provider, has
    /// no targets, or a mapping table is malformed.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_virtual_models()?;
        self.validate_mapping_tables()?;
        Ok(())
    }

    fn validate_virtual_models(&self) -> anyhow::Result<()> {
        for (id, vm) in &self.llm.virtual_models {
            if vm.targets.is_empty() {
                anyhow::bail!("virtual model '{id}' has no targets");
            }
            let mut seen = std::collections::HashSet::new();
            for target in &vm.targets {
                if !self.llm.providers.contains_key(&target.provider_id) {
                    anyhow::bail!(
                        "virtual model '{id}' target '{}' references unknown provider '{}'",
                        target.id,
                        target.provider_id
                    );
                }
                if !seen.insert(&target.id) {
                    anyhow::bail!("virtual model '{id}' has duplicate target id '{}'", target.id);
                }
            }
        }
        Ok(())
    }

    fn validate_mapping_tables(&self) -> anyhow::Result<()> {
        for (provider_id, table) in &self.mapping_tables {
            if !self.llm.providers.contains_key(provider_id) {
                anyhow::bail!("mapping table references unknown provider '{provider_id}'");
            }
            for rule in table.request_fields.iter().chain(table.response_fields.iter()) {
                if rule.source.is_empty() || rule.target.is_empty() {
                    anyhow::bail!("mapping table for '{provider_id}' has an empty field path");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_virtual_model_with_no_targets() {
        let toml = r#"
            [llm.virtual_models.vm1]
            id = "vm1"
            targets = []
        "#;
        let config: ConfigSnapshot = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_target_with_unknown_provider() {
        let toml = r#"
            [llm.virtual_models.vm1]
            id = "vm1"

            [[llm.virtual_models.vm1.targets]]
            id = "t1"
            provider_id = "ghost"
            model_id = "m1"
        "#;
        let config: ConfigSnapshot = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_consistent_snapshot() {
        let toml = r#"
            [llm.providers.a]
            id = "a"
            protocol = "openai"
            base_url = "https://api.example.com/v1"

            [llm.virtual_models.vm1]
            id = "vm1"

            [[llm.virtual_models.vm1.targets]]
            id = "t1"
            provider_id = "a"
            model_id = "m1"
        "#;
        let config: ConfigSnapshot = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_target_ids() {
        let toml = r#"
            [llm.providers.a]
            id = "a"
            protocol = "openai"
            base_url = "https://api.example.com/v1"

            [llm.virtual_models.vm1]
            id = "vm1"

            [[llm.virtual_models.vm1.targets]]
            id = "t1"
            provider_id = "a"
            model_id = "m1"

            [[llm.virtual_models.vm1.targets]]
            id = "t1"
            provider_id = "a"
            model_id = "m2"
        "#;
        let config: ConfigSnapshot = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }
}
