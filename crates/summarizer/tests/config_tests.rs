use std::{fs, path::PathBuf};

use anyhow::Result;
use candle_core::{DType, Device};
use summarizer::{SummarizerConfig, SummarizerError};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.path().join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

#[test]
fn toml_file_fills_in_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write(
        &dir,
        "model.toml",
        "vocab_size = 50\nbatch_size = 2\nmax_summary_length = 3\n",
    )?;

    let config = SummarizerConfig::from_path(&path)?;
    assert_eq!(config.vocab_size, 50);
    assert_eq!(config.batch_size, 2);
    assert_eq!(config.max_summary_length, 3);
    assert_eq!(config.embedding_dim, 128);
    assert_eq!(config.hidden_size, 256);
    assert!(!config.copy_mechanism);
    assert_eq!(config.dtype, DType::F32);
    assert!(matches!(config.device, Device::Cpu));
    Ok(())
}

#[test]
fn json_file_overrides_every_field() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write(
        &dir,
        "model.json",
        r#"{
            "vocab_size": 1000,
            "batch_size": 4,
            "max_summary_length": 12,
            "embedding_dim": 32,
            "hidden_size": 64,
            "copy_mechanism": true,
            "dtype": "bf16",
            "device": "cpu"
        }"#,
    )?;

    let config = SummarizerConfig::from_path(&path)?;
    assert_eq!(config.embedding_dim, 32);
    assert_eq!(config.hidden_size, 64);
    assert_eq!(config.feature_dim(), 128);
    assert!(config.copy_mechanism);
    assert_eq!(config.dtype, DType::BF16);
    Ok(())
}

#[test]
fn extensionless_files_are_read_as_toml() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write(
        &dir,
        "model",
        "vocab_size = 10\nbatch_size = 1\nmax_summary_length = 1\nhidden_size = 8\n",
    )?;
    assert_eq!(SummarizerConfig::from_path(&path)?.hidden_size, 8);
    Ok(())
}

#[test]
fn invalid_files_are_rejected() -> Result<()> {
    let dir = TempDir::new()?;

    let zero = write(
        &dir,
        "zero.toml",
        "vocab_size = 0\nbatch_size = 2\nmax_summary_length = 0\n",
    )?;
    match SummarizerConfig::from_path(&zero) {
        Err(SummarizerError::Validation(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected validation failure, got {other:?}"),
    }

    let unknown = write(
        &dir,
        "unknown.toml",
        "vocab_size = 5\nbatch_size = 2\nmax_summary_length = 2\nlayers = 3\n",
    )?;
    assert!(matches!(
        SummarizerConfig::from_path(&unknown),
        Err(SummarizerError::Toml(_))
    ));

    let dtype = write(
        &dir,
        "dtype.json",
        r#"{"vocab_size": 5, "batch_size": 2, "max_summary_length": 2, "dtype": "int8"}"#,
    )?;
    assert!(matches!(
        SummarizerConfig::from_path(&dtype),
        Err(SummarizerError::Config(_))
    ));

    let yaml = write(&dir, "model.yaml", "vocab_size: 5\n")?;
    assert!(matches!(
        SummarizerConfig::from_path(&yaml),
        Err(SummarizerError::Config(_))
    ));

    assert!(matches!(
        SummarizerConfig::from_path(dir.path().join("missing.toml")),
        Err(SummarizerError::Io(_))
    ));
    Ok(())
}
