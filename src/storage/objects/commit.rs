use super::{get, GitObject, ObjectKind};
use anyhow::{bail, Context, Result};
use std::path::Path;

const DEFAULT_NAME: &str = "John Doe";
const DEFAULT_EMAIL: &str = "john@example.com";
const DEFAULT_TIMESTAMP: i64 = 1234567890;
const DEFAULT_TZ: &str = "+0000";

/// Identity line of a commit: `name <email> seconds tz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
    pub tz: String,
}

impl Signature {
    /// Resolves the identity from `GIT_AUTHOR_NAME` / `GIT_AUTHOR_EMAIL` /
    /// `GIT_AUTHOR_DATE` (`<unix_seconds> <tz>`), falling back to fixed
    /// literals so commit digests stay reproducible without configuration.
    pub fn from_env() -> Self {
        let name = std::env::var("GIT_AUTHOR_NAME").unwrap_or_else(|_| DEFAULT_NAME.to_string());
        let email =
            std::env::var("GIT_AUTHOR_EMAIL").unwrap_or_else(|_| DEFAULT_EMAIL.to_string());

        let (timestamp, tz) = std::env::var("GIT_AUTHOR_DATE")
            .ok()
            .and_then(|date| {
                let (secs, tz) = date.split_once(' ')?;
                Some((secs.parse().ok()?, tz.to_string()))
            })
            .unwrap_or((DEFAULT_TIMESTAMP, DEFAULT_TZ.to_string()));

        Self {
            name,
            email,
            timestamp,
            tz,
        }
    }

    fn to_line(&self) -> String {
        format!("{} <{}> {} {}", self.name, self.email, self.timestamp, self.tz)
    }
}

/// A snapshot of a tree plus parent links and identity metadata.
#[derive(Debug)]
pub struct Commit {
    pub tree: String,
    pub parents: Vec<String>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    /// Builds a commit with identity taken from the environment; the
    /// committer mirrors the author.
    pub fn new(tree: String, parent: Option<String>, message: String) -> Self {
        let author = Signature::from_env();
        Self {
            tree,
            parents: parent.into_iter().collect(),
            committer: author.clone(),
            author,
            message,
        }
    }

    pub fn load(objects_dir: &Path, hash: &str) -> Result<Self> {
        let (kind, payload) = get(objects_dir, hash)?;
        if kind != ObjectKind::Commit {
            bail!("Object {} is a {}, not a commit", hash, kind);
        }
        Self::parse(&payload)
    }

    /// Parses a commit payload. Headers end at the first blank line; header
    /// keys this tool does not model (gpgsig and friends, including their
    /// indented continuation lines) are skipped rather than rejected, since
    /// cloned commits carry them.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload).context("Commit payload is not UTF-8")?;

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut message = Vec::new();
        let mut in_message = false;

        for line in text.lines() {
            if in_message {
                message.push(line);
                continue;
            }
            if line.is_empty() {
                in_message = true;
                continue;
            }
            if line.starts_with(' ') {
                continue;
            }

            let (key, value) = line
                .split_once(' ')
                .context("Malformed commit header line")?;
            match key {
                "tree" => tree = Some(value.to_string()),
                "parent" => parents.push(value.to_string()),
                "author" => author = Some(parse_signature(value)?),
                "committer" => committer = Some(parse_signature(value)?),
                _ => {}
            }
        }

        let author = author.context("Commit has no author header")?;
        Ok(Self {
            tree: tree.context("Commit has no tree header")?,
            parents,
            committer: committer.unwrap_or_else(|| author.clone()),
            author,
            message: message.join("\n"),
        })
    }
}

fn parse_signature(value: &str) -> Result<Signature> {
    let open = value.find('<').context("Signature has no email")?;
    let close = value.find('>').context("Signature has no email")?;

    let name = value[..open].trim_end().to_string();
    let email = value[open + 1..close].to_string();

    let mut rest = value[close + 1..].split_whitespace();
    let timestamp = rest
        .next()
        .context("Signature has no timestamp")?
        .parse()
        .context("Signature timestamp is not a number")?;
    let tz = rest.next().unwrap_or("+0000").to_string();

    Ok(Signature {
        name,
        email,
        timestamp,
        tz,
    })
}

impl GitObject for Commit {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Commit
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let mut content = String::new();
        content.push_str(&format!("tree {}\n", self.tree));
        for parent in &self.parents {
            content.push_str(&format!("parent {}\n", parent));
        }
        content.push_str(&format!("author {}\n", self.author.to_line()));
        content.push_str(&format!("committer {}\n", self.committer.to_line()));
        content.push('\n');
        content.push_str(&self.message);
        content.push('\n');
        Ok(content.into_bytes())
    }
}
