use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty("STUDENTIO_BOT_TOKEN") {
            self.launch.bot_token = Some(token.trim().to_string());
        }

        if let Some(endpoint) = non_empty("STUDENTIO_STREAM_ENDPOINT") {
            self.stream.endpoint = endpoint;
        }

        if let Some(model) = non_empty("STUDENTIO_MODEL") {
            self.stream.model = model;
        }

        if let Some(temp_str) = non_empty("STUDENTIO_TEMPERATURE")
            && let Ok(temp) = temp_str.trim().parse::<f64>()
            && (0.0..=2.0).contains(&temp)
        {
            self.stream.temperature = temp;
        }

        if let Some(host) = non_empty("STUDENTIO_GATEWAY_HOST") {
            self.gateway.host = host;
        }

        if let Some(port_str) = non_empty("STUDENTIO_GATEWAY_PORT")
            && let Ok(port) = port_str.trim().parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.gateway.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::collections::HashMap;

    fn apply(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut config = Config::default();
        config.apply_overrides_from(|key| vars.get(key).cloned());
        config
    }

    #[test]
    fn overrides_replace_config_values() {
        let config = apply(&[
            ("STUDENTIO_BOT_TOKEN", " 1:abc "),
            ("STUDENTIO_STREAM_ENDPOINT", "https://x.test/stream"),
            ("STUDENTIO_MODEL", "mistral"),
            ("STUDENTIO_TEMPERATURE", "0.3"),
            ("STUDENTIO_GATEWAY_HOST", "0.0.0.0"),
            ("STUDENTIO_GATEWAY_PORT", "8080"),
        ]);

        assert_eq!(config.launch.bot_token.as_deref(), Some("1:abc"));
        assert_eq!(config.stream.endpoint, "https://x.test/stream");
        assert_eq!(config.stream.model, "mistral");
        assert!((config.stream.temperature - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn invalid_values_are_ignored() {
        let config = apply(&[
            ("STUDENTIO_TEMPERATURE", "7"),
            ("STUDENTIO_GATEWAY_PORT", "not-a-port"),
            ("STUDENTIO_MODEL", "  "),
        ]);
        let defaults = Config::default();

        assert!((config.stream.temperature - defaults.stream.temperature).abs() < f64::EPSILON);
        assert_eq!(config.gateway.port, defaults.gateway.port);
        assert_eq!(config.stream.model, defaults.stream.model);
    }

    #[test]
    fn allowed_origins_split_on_commas() {
        let config = apply(&[(
            "ALLOWED_ORIGINS",
            "https://a.test, ,https://b.test ,",
        )]);
        assert_eq!(
            config.gateway.allowed_origins,
            vec!["https://a.test", "https://b.test"]
        );
    }
}
