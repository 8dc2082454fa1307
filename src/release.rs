//! Publicação de uma nova versão patch do pacote
//!
//! Incrementa o patch no manifest, faz commit e push e publica no registry
//! (opcionalmente antes em um registry de teste).

use std::fmt;
use std::path::{Path, PathBuf};

use semver::{Prerelease, Version};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{ConfigError, ETLError, ExecutionError, Result};

pub const REGISTRY_TOKEN_ENV: &str = "CARGO_REGISTRY_TOKEN";
pub const TEST_REGISTRY_TOKEN_ENV: &str = "TEST_REGISTRY_TOKEN";
pub const COMMIT_MESSAGE: &str = "New version build.";

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub manifest: PathBuf,
    /// Registry publicado antes do principal
    pub test_registry: Option<String>,
    pub skip_publish: bool,
    pub dry_run: bool,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("Cargo.toml"),
            test_registry: None,
            skip_publish: false,
            dry_run: false,
        }
    }
}

/// Tokens de publicação, lidos do ambiente
#[derive(Clone, Default)]
pub struct ReleaseTokens {
    pub registry: Option<String>,
    pub test_registry: Option<String>,
}

impl ReleaseTokens {
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            registry: read(REGISTRY_TOKEN_ENV),
            test_registry: read(TEST_REGISTRY_TOKEN_ENV),
        }
    }
}

impl fmt::Debug for ReleaseTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseTokens")
            .field("registry", &self.registry.as_ref().map(|_| "***"))
            .field("test_registry", &self.test_registry.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Um comando externo do processo de release
#[derive(Clone, PartialEq, Eq)]
pub struct ReleaseStep {
    pub program: String,
    pub args: Vec<String>,
}

impl ReleaseStep {
    fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn with_token(mut self, token: Option<&String>) -> Self {
        if let Some(token) = token {
            self.args.push("--token".to_string());
            self.args.push(token.clone());
        }
        self
    }
}

/// Exibe o comando sem o valor de `--token`
impl fmt::Display for ReleaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        let mut hide_next = false;
        for arg in &self.args {
            if hide_next {
                write!(f, " ***")?;
                hide_next = false;
                continue;
            }
            hide_next = arg == "--token";
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ReleaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReleaseStep({})", self)
    }
}

fn bump_line(line: &str) -> Result<Option<(String, Version)>> {
    // Só `version = ...`; chaves como `version.workspace` ficam intactas
    let Some(value) = line
        .strip_prefix("version")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('='))
    else {
        return Ok(None);
    };

    let raw = value.trim().trim_matches('"');
    let mut version = Version::parse(raw).map_err(|e| {
        ETLError::Config(ConfigError::InvalidValue {
            param: "version".to_string(),
            value: format!("{} ({})", raw, e),
        })
    })?;
    version.patch += 1;
    version.pre = Prerelease::EMPTY;

    let newline = if line.ends_with('\n') { "\n" } else { "" };
    Ok(Some((format!("version = \"{}\"{}", version, newline), version)))
}

/// Incrementa o patch de cada linha `version = "x.y.z"` do conteúdo
pub fn bump_patch_content(content: &str) -> Result<(String, Option<Version>)> {
    let mut output = String::with_capacity(content.len());
    let mut bumped = None;

    for line in content.split_inclusive('\n') {
        match bump_line(line)? {
            Some((new_line, version)) => {
                output.push_str(&new_line);
                bumped = Some(version);
            }
            None => output.push_str(line),
        }
    }

    Ok((output, bumped))
}

/// Reescreve o manifest com o patch incrementado e devolve a nova versão
pub fn bump_patch_version(manifest: &Path) -> Result<Version> {
    let content = std::fs::read_to_string(manifest)?;
    let (updated, version) = bump_patch_content(&content)?;
    let version = version.ok_or_else(|| {
        ETLError::Config(ConfigError::MissingRequiredParameter(format!(
            "version em {}",
            manifest.display()
        )))
    })?;

    std::fs::write(manifest, updated)?;
    info!(manifest = %manifest.display(), version = %version, "Versão atualizada");
    Ok(version)
}

/// Sequência de comandos após o bump
pub fn release_steps(opts: &ReleaseOptions, tokens: &ReleaseTokens) -> Vec<ReleaseStep> {
    let manifest = opts.manifest.to_string_lossy().to_string();
    let mut steps = vec![
        ReleaseStep::new("git", ["add", manifest.as_str()]),
        ReleaseStep::new("git", ["commit", "-m", COMMIT_MESSAGE]),
        ReleaseStep::new("git", ["push"]),
    ];

    if opts.skip_publish {
        return steps;
    }

    if let Some(registry) = &opts.test_registry {
        steps.push(
            ReleaseStep::new(
                "cargo",
                ["publish", "--manifest-path", manifest.as_str(), "--registry", registry.as_str()],
            )
            .with_token(tokens.test_registry.as_ref()),
        );
    }
    steps.push(
        ReleaseStep::new("cargo", ["publish", "--manifest-path", manifest.as_str()])
            .with_token(tokens.registry.as_ref()),
    );

    steps
}

#[derive(Debug, Clone)]
pub struct ReleaseReport {
    pub version: Version,
    pub steps: Vec<ReleaseStep>,
    pub executed: usize,
}

/// Executa o release; para no primeiro passo com falha
pub async fn run_release(opts: &ReleaseOptions, tokens: &ReleaseTokens) -> Result<ReleaseReport> {
    let steps = release_steps(opts, tokens);

    if opts.dry_run {
        let content = std::fs::read_to_string(&opts.manifest)?;
        let (_, version) = bump_patch_content(&content)?;
        let version = version.ok_or_else(|| {
            ETLError::Config(ConfigError::MissingRequiredParameter("version".to_string()))
        })?;
        for step in &steps {
            info!(step = %step, "dry-run");
        }
        return Ok(ReleaseReport { version, steps, executed: 0 });
    }

    let version = bump_patch_version(&opts.manifest)?;
    let mut executed = 0;

    for step in &steps {
        info!(step = %step, "Executando passo do release");
        let output = Command::new(&step.program).args(&step.args).output().await?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            warn!(step = %step, code = ?output.status.code(), "Passo do release falhou");
            return Err(ExecutionError::NonZeroExit {
                command: step.to_string(),
                code: output.status.code(),
                output: text,
            }
            .into());
        }
        executed += 1;
    }

    info!(version = %version, steps = executed, "Release concluído");
    Ok(ReleaseReport { version, steps, executed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bump_patch_content() {
        let content = "[package]\nname = \"x\"\nversion = \"0.4.9\"\nedition = \"2021\"\n";
        let (updated, version) = bump_patch_content(content).unwrap();
        assert_eq!(version, Some(Version::new(0, 4, 10)));
        assert_eq!(updated, "[package]\nname = \"x\"\nversion = \"0.4.10\"\nedition = \"2021\"\n");
    }

    #[test]
    fn test_only_plain_version_key_is_bumped() {
        let content = "[package]\nversion.workspace = true\nversions = \"x\"\n\n[dependencies]\nfoo = { version = \"1.0\" }\n";
        let (updated, version) = bump_patch_content(content).unwrap();
        assert_eq!(version, None);
        assert_eq!(updated, content);

        let (updated, version) = bump_patch_content("version=\"2.0.0\"\n").unwrap();
        assert_eq!(version, Some(Version::new(2, 0, 1)));
        assert_eq!(updated, "version = \"2.0.1\"\n");
    }

    #[test]
    fn test_invalid_version_fails() {
        assert!(bump_patch_content("version = \"abc\"\n").is_err());
    }

    #[test]
    fn test_bump_patch_version_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("Cargo.toml");
        std::fs::write(&manifest, "version = \"1.2.3\"").unwrap();

        assert_eq!(bump_patch_version(&manifest).unwrap(), Version::new(1, 2, 4));
        assert_eq!(std::fs::read_to_string(&manifest).unwrap(), "version = \"1.2.4\"");
    }

    #[test]
    fn test_release_steps_with_tokens() {
        let opts = ReleaseOptions {
            test_registry: Some("staging".into()),
            ..ReleaseOptions::default()
        };
        let tokens = ReleaseTokens {
            registry: Some("segredo".into()),
            test_registry: None,
        };

        let steps = release_steps(&opts, &tokens);
        let rendered: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "git add Cargo.toml",
                "git commit -m \"New version build.\"",
                "git push",
                "cargo publish --manifest-path Cargo.toml --registry staging",
                "cargo publish --manifest-path Cargo.toml --token ***",
            ]
        );
        assert!(steps[4].args.contains(&"segredo".to_string()));
    }

    #[test]
    fn test_skip_publish() {
        let opts = ReleaseOptions {
            skip_publish: true,
            ..ReleaseOptions::default()
        };
        assert_eq!(release_steps(&opts, &ReleaseTokens::default()).len(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_touch_manifest() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("Cargo.toml");
        std::fs::write(&manifest, "version = \"0.1.0\"\n").unwrap();

        let opts = ReleaseOptions {
            manifest: manifest.clone(),
            dry_run: true,
            ..ReleaseOptions::default()
        };
        let report = run_release(&opts, &ReleaseTokens::default()).await.unwrap();

        assert_eq!(report.version, Version::new(0, 1, 1));
        assert_eq!(report.executed, 0);
        assert_eq!(std::fs::read_to_string(&manifest).unwrap(), "version = \"0.1.0\"\n");
    }
}
