use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct ChunkToolConfig {
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub registry: RegistrySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct InputSection {
    /// Chunk NBT file. Without one the tool checks a generated flat chunk.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub compression: Compression,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Sniff the header bytes.
    #[default]
    Auto,
    Gzip,
    Zlib,
    None,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub format: OutputFormat,
    /// Write the re-encoded chunk here, gzip-compressed.
    #[serde(default)]
    pub save_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegistrySection {
    /// Data generator `reports/blocks.json`. Without one only the first
    /// vanilla blocks are known.
    #[serde(default)]
    pub blocks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ChunkToolConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            [input]
            path = "r.0.0/chunk_3_-7.nbt"
            compression = "gzip"

            [output]
            format = "json"
            save_path = "out.nbt.gz"

            [registry]
            blocks = "generated/reports/blocks.json"

            [logging]
            level = "debug"
        "#;
        let config: ChunkToolConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.input.path.as_deref(), Some("r.0.0/chunk_3_-7.nbt"));
        assert_eq!(config.input.compression, Compression::Gzip);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.save_path.as_deref(), Some("out.nbt.gz"));
        assert_eq!(
            config.registry.blocks.as_deref(),
            Some("generated/reports/blocks.json")
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: ChunkToolConfig = toml::from_str("").unwrap();
        assert_eq!(config.input.path, None);
        assert_eq!(config.input.compression, Compression::Auto);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.output.save_path, None);
        assert_eq!(config.registry.blocks, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let result: Result<ChunkToolConfig, _> = toml::from_str("[input]\ncompression = \"lz4\"");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ChunkToolConfig::load("definitely/not/here.toml").is_err());
    }
}
