//! GitHub URL parsing and the `git` subprocess facade.
//!
//! Every version-control operation shells out to the installed `git`
//! binary. Output is captured so failures carry git's own stderr; nothing is
//! retried.

use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use crate::error::{GitError, MIN_GIT_VERSION};
use crate::skill_dir::MANIFEST_FILE;

static TREE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https://github\.com/[^/]+/[^/]+)/tree/([^/]+)/(.+)$").expect("valid regex")
});
static TREE_BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https://github\.com/[^/]+/[^/]+)/tree/([^/]+)$").expect("valid regex")
});
static GITHUB_REPO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com/([^/]+/[^/]+?)(\.git)?$").expect("valid regex")
});
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"git version (\d+)\.(\d+)").expect("valid regex"));
static LS_REMOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([a-f0-9]+)\t").expect("valid regex"));
static SYMREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ref: refs/heads/([^\t\n]+)").expect("valid regex"));

/// Parsed components of a GitHub URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlInfo {
    /// Clone URL, always ending in `.git`.
    pub url: String,
    pub branch: Option<String>,
    /// Subdirectory inside the repository, without a trailing slash.
    pub path: Option<String>,
}

impl UrlInfo {
    /// `owner/repo` when the URL points at github.com.
    pub fn github_repo(&self) -> Option<String> {
        GITHUB_REPO_RE
            .captures(&self.url)
            .map(|caps| caps[1].trim_end_matches(".git").to_string())
    }
}

/// Parse a GitHub web URL into clone URL, branch and subdirectory.
///
/// Supports:
/// - `https://github.com/user/repo`
/// - `https://github.com/user/repo/tree/branch`
/// - `https://github.com/user/repo/tree/branch/path/to/skill`
///
/// Branch names containing `/` must be percent-encoded (`feature%2Fx`).
pub fn normalize_url(input: &str) -> UrlInfo {
    let mut url = input.trim().trim_end_matches('/');

    if let Some(idx) = url.find('?') {
        url = &url[..idx];
    }
    if let Some(idx) = url.find('#') {
        url = &url[..idx];
    }
    let url = url.strip_suffix(".git").unwrap_or(url);

    if let Some(caps) = TREE_PATH_RE.captures(url) {
        let path = percent_decode(&caps[3]).trim_end_matches('/').to_string();
        return UrlInfo {
            url: format!("{}.git", &caps[1]),
            branch: Some(percent_decode(&caps[2])),
            path: (!path.is_empty()).then_some(path),
        };
    }

    if let Some(caps) = TREE_BRANCH_RE.captures(url) {
        return UrlInfo {
            url: format!("{}.git", &caps[1]),
            branch: Some(percent_decode(&caps[2])),
            path: None,
        };
    }

    UrlInfo {
        url: format!("{}.git", url),
        branch: None,
        path: None,
    }
}

fn percent_decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Extract `(major, minor)` from `git --version` output.
pub fn parse_git_version(output: &str) -> Result<(u32, u32), GitError> {
    let caps = VERSION_RE
        .captures(output)
        .ok_or_else(|| GitError::UnparseableVersion(output.trim().to_string()))?;
    let major = caps[1]
        .parse()
        .map_err(|_| GitError::UnparseableVersion(output.trim().to_string()))?;
    let minor = caps[2]
        .parse()
        .map_err(|_| GitError::UnparseableVersion(output.trim().to_string()))?;
    Ok((major, minor))
}

fn parse_ls_remote_hash(output: &str) -> Option<String> {
    LS_REMOTE_RE.captures(output).map(|caps| caps[1].to_string())
}

fn parse_symref_branch(output: &str) -> Option<String> {
    SYMREF_RE.captures(output).map(|caps| caps[1].to_string())
}

/// Thin wrapper over the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct Git;

impl Git {
    pub fn new() -> Self {
        Self
    }

    /// Run git and return trimmed stdout, or the stderr as an error.
    fn run(&self, args: &[&str], cwd: Option<&Path>, action: &str) -> Result<String, GitError> {
        tracing::debug!(?args, cwd = ?cwd, "running git");

        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(GitError::command_failed(action, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Ensure git >= 2.25 is installed (needed for cone-mode sparse-checkout).
    pub fn check_version(&self) -> Result<(u32, u32), GitError> {
        let output = Command::new("git")
            .arg("--version")
            .output()
            .map_err(GitError::NotInstalled)?;
        let (major, minor) = parse_git_version(&String::from_utf8_lossy(&output.stdout))?;

        if (major, minor) < MIN_GIT_VERSION {
            return Err(GitError::TooOld { major, minor });
        }
        Ok((major, minor))
    }

    /// Commit hash a remote ref points at. `None` means `HEAD`.
    pub fn remote_head(&self, url: &str, git_ref: Option<&str>) -> Result<String, GitError> {
        let git_ref = git_ref.unwrap_or("HEAD");
        let out = self.run(&["ls-remote", url, git_ref], None, "git ls-remote")?;
        parse_ls_remote_hash(&out).ok_or_else(|| GitError::UnexpectedOutput {
            what: format!("remote head for {} {}", url, git_ref),
        })
    }

    /// Full clone, optionally of a specific branch.
    pub fn clone_full(&self, url: &str, dest: &Path, branch: Option<&str>) -> Result<(), GitError> {
        let dest = dest.to_string_lossy();
        let mut args = vec!["clone", "--quiet"];
        if let Some(branch) = branch {
            args.extend(["--branch", branch]);
        }
        args.extend([url, dest.as_ref()]);
        self.run(&args, None, "git clone")?;
        Ok(())
    }

    /// Blob-filtered clone with a cone-mode sparse checkout of `sub_path`.
    pub fn clone_sparse(
        &self,
        url: &str,
        dest: &Path,
        sub_path: &str,
        branch: &str,
    ) -> Result<(), GitError> {
        let dest_str = dest.to_string_lossy();
        self.run(
            &[
                "clone",
                "--quiet",
                "--filter=blob:none",
                "--no-checkout",
                url,
                dest_str.as_ref(),
            ],
            None,
            "sparse clone",
        )?;
        self.run(&["sparse-checkout", "init", "--cone"], Some(dest), "sparse-checkout init")?;
        self.run(&["sparse-checkout", "set", sub_path], Some(dest), "sparse-checkout set")?;
        self.run(
            &["checkout", "--quiet", branch],
            Some(dest),
            &format!("checkout {}", branch),
        )?;
        Ok(())
    }

    pub fn pull(&self, dir: &Path) -> Result<(), GitError> {
        self.run(&["pull", "--quiet"], Some(dir), "git pull")?;
        Ok(())
    }

    pub fn fetch(&self, dir: &Path) -> Result<(), GitError> {
        self.run(&["fetch", "--quiet", "origin"], Some(dir), "git fetch")?;
        Ok(())
    }

    /// Whether `SKILL.md` exists at `sub_path` on `branch` of a remote repo.
    ///
    /// Tries `git archive --remote` first; most hosts (GitHub included) refuse
    /// it, so it falls back to a shallow sparse clone in a temp directory that
    /// is removed when the probe returns.
    pub fn has_remote_manifest(&self, url: &str, branch: &str, sub_path: Option<&str>) -> bool {
        let manifest_path = match sub_path {
            Some(p) => format!("{}/{}", p, MANIFEST_FILE),
            None => MANIFEST_FILE.to_string(),
        };

        let commit = match self.remote_head(url, Some(&format!("refs/heads/{}", branch))) {
            Ok(commit) => commit,
            Err(e) => {
                tracing::debug!(error = %e, "remote branch lookup failed");
                return false;
            }
        };

        if self
            .run(
                &["archive", "--remote", url, &commit, &manifest_path],
                None,
                "git archive",
            )
            .is_ok()
        {
            return true;
        }

        let tmp = match tempfile::Builder::new().prefix("agm-check-").tempdir() {
            Ok(tmp) => tmp,
            Err(e) => {
                tracing::warn!(error = %e, "could not create temp dir for manifest probe");
                return false;
            }
        };
        let checkout = tmp.path().join("repo");
        let checkout_str = checkout.to_string_lossy();

        let cloned = self.run(
            &[
                "clone",
                "--quiet",
                "--depth=1",
                "--filter=blob:none",
                "--no-checkout",
                "--branch",
                branch,
                url,
                checkout_str.as_ref(),
            ],
            None,
            "probe clone",
        );
        if cloned.is_err() {
            return false;
        }

        if let Some(sub_path) = sub_path {
            let sparse = self
                .run(&["sparse-checkout", "init", "--cone"], Some(&checkout), "sparse-checkout init")
                .and_then(|_| {
                    self.run(&["sparse-checkout", "set", sub_path], Some(&checkout), "sparse-checkout set")
                });
            if sparse.is_err() {
                return false;
            }
        }

        if self
            .run(&["checkout", "--quiet", branch], Some(&checkout), "checkout")
            .is_err()
        {
            return false;
        }

        checkout.join(&manifest_path).is_file()
    }

    /// Default branch of a remote repo, `main` when it cannot be discovered.
    pub fn default_branch(&self, url: &str) -> String {
        self.run(&["ls-remote", "--symref", url, "HEAD"], None, "git ls-remote --symref")
            .ok()
            .and_then(|out| parse_symref_branch(&out))
            .unwrap_or_else(|| "main".to_string())
    }

    /// Branch currently checked out in a local clone.
    pub fn current_branch(&self, repo_dir: &Path) -> Result<String, GitError> {
        self.run(
            &["rev-parse", "--abbrev-ref", "HEAD"],
            Some(repo_dir),
            "git rev-parse --abbrev-ref",
        )
    }

    /// Latest commit touching `sub_path` in a local repo, or `HEAD` when the
    /// path has no history.
    pub fn path_commit_id(&self, repo_dir: &Path, sub_path: &str) -> Result<String, GitError> {
        if let Ok(out) = self.run(
            &["log", "-1", "--format=%H", "--", sub_path],
            Some(repo_dir),
            "git log",
        ) {
            if !out.is_empty() {
                return Ok(out);
            }
        }
        self.run(&["rev-parse", "HEAD"], Some(repo_dir), "git rev-parse HEAD")
    }

    /// Latest commit touching `sub_path` on a remote-tracking branch such as
    /// `origin/main`. Call after [`Git::fetch`].
    pub fn remote_path_commit_id(
        &self,
        repo_dir: &Path,
        remote_branch: &str,
        sub_path: &str,
    ) -> Result<String, GitError> {
        if let Ok(out) = self.run(
            &["log", "-1", "--format=%H", remote_branch, "--", sub_path],
            Some(repo_dir),
            "git log",
        ) {
            if !out.is_empty() {
                return Ok(out);
            }
        }
        self.run(
            &["rev-parse", remote_branch],
            Some(repo_dir),
            &format!("git rev-parse {}", remote_branch),
        )
    }
}
