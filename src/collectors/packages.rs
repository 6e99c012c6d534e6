use crate::command::CommandRunner;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// How a package manager's installed list is obtained.
#[derive(Debug, Clone, Copy)]
pub enum ListSource {
    /// Run a program; every output line is one package.
    Command(&'static str, &'static [&'static str]),
    /// Count the entries of every directory matching a `*` pattern.
    Dirs(&'static str),
    /// Homebrew keeps formulae and casks under prefixes it reports itself.
    Brew,
}

#[derive(Debug, Clone, Copy)]
pub struct PackageManager {
    /// Binary whose presence in `PATH` enables this manager.
    pub name: &'static str,
    pub source: ListSource,
}

const fn cmd(
    name: &'static str,
    program: &'static str,
    args: &'static [&'static str],
) -> PackageManager {
    PackageManager {
        name,
        source: ListSource::Command(program, args),
    }
}

const fn dirs(name: &'static str, pattern: &'static str) -> PackageManager {
    PackageManager {
        name,
        source: ListSource::Dirs(pattern),
    }
}

pub const PACKAGE_MANAGERS: &[PackageManager] = &[
    cmd("kiss", "kiss", &["l"]),
    cmd("cpt-list", "cpt-list", &[]),
    cmd("pacman", "pacman", &["-Qq", "--color", "never"]),
    cmd("dpkg", "dpkg-query", &["-f", ".\n", "-W"]),
    cmd("xbps-query", "xbps-query", &["-l"]),
    cmd("apk", "apk", &["info"]),
    cmd("opkg", "opkg", &["list-installed"]),
    cmd("pacman-g2", "pacman-g2", &["-Q"]),
    cmd("lvu", "lvu", &["installed"]),
    cmd("tce-status", "tce-status", &["-i"]),
    cmd("pkg_info", "pkg_info", &[]),
    cmd("pkgin", "pkgin", &["list"]),
    cmd("sorcery", "gaze", &["installed"]),
    cmd("alps", "alps", &["showinstalled"]),
    cmd("butch", "butch", &["list"]),
    cmd("swupd", "swupd", &["bundle-list", "--quiet"]),
    cmd("pisi", "pisi", &["li"]),
    cmd("pacstall", "pacstall", &["-L"]),
    cmd("rpm", "rpm", &["-qa"]),
    cmd("flatpak", "flatpak", &["list"]),
    cmd("spm", "spm", &["list", "-i"]),
    cmd("pkg", "pkg", &["info"]),
    PackageManager {
        name: "brew",
        source: ListSource::Brew,
    },
    dirs("emerge", "/var/db/pkg/*/*"),
    dirs("Compile", "/Programs/*"),
    dirs("eopkg", "/var/lib/eopkg/package/*"),
    dirs("pkgtool", "/var/log/packages/*"),
    dirs("scratch", "/var/lib/scratchpkg/index/*/.pkginfo"),
    dirs("kagami", "/var/lib/kagami/pkgs/*"),
];

/// `(manager, count)` for every manager present on this host. The count is a
/// line count of the manager's listing, so headers or multi-line entries skew it.
pub async fn collect_packages(
    runner: &CommandRunner,
    managers: &[PackageManager],
) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    for manager in managers {
        if !runner.has(manager.name) {
            continue;
        }
        if let Some(count) = count_installed(runner, manager).await {
            debug!(manager = manager.name, count, "counted installed packages");
            out.push((manager.name.to_string(), count));
        }
    }
    out
}

async fn count_installed(runner: &CommandRunner, manager: &PackageManager) -> Option<usize> {
    match manager.source {
        ListSource::Command(program, args) => match runner.run(program, args).await {
            Ok(output) => Some(output.line_count()),
            Err(err) => {
                warn!(manager = manager.name, error = %err, "package listing failed");
                None
            }
        },
        ListSource::Dirs(pattern) => Some(count_dir_entries(pattern)),
        ListSource::Brew => {
            let mut total = 0;
            for flag in ["--cellar", "--caskroom"] {
                let prefix = match runner.run("brew", &[flag]).await {
                    Ok(output) => output.text().trim().to_string(),
                    Err(err) => {
                        warn!(manager = "brew", error = %err, "brew prefix lookup failed");
                        return None;
                    }
                };
                if !prefix.is_empty() {
                    total += count_dir_entries(&format!("{prefix}/*"));
                }
            }
            Some(total)
        }
    }
}

/// Mirrors `ls -1A <pattern>`: directories contribute their entries (hidden
/// ones included), plain files contribute one line each.
fn count_dir_entries(pattern: &str) -> usize {
    expand_pattern(pattern)
        .iter()
        .map(|path| match fs::read_dir(path) {
            Ok(entries) => entries.flatten().count(),
            Err(_) if path.is_file() => 1,
            Err(_) => 0,
        })
        .sum()
}

/// Expands an absolute path whose components are either literal names or a
/// lone `*` (matching non-hidden entries).
fn expand_pattern(pattern: &str) -> Vec<PathBuf> {
    let mut matches = vec![PathBuf::from("/")];
    for component in pattern.split('/').filter(|c| !c.is_empty()) {
        let mut next = Vec::new();
        for base in &matches {
            if component == "*" {
                let Ok(entries) = fs::read_dir(base) else {
                    continue;
                };
                let mut children: Vec<PathBuf> = entries
                    .flatten()
                    .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
                    .map(|e| e.path())
                    .collect();
                children.sort();
                next.extend(children);
            } else {
                let candidate = base.join(component);
                if candidate.exists() {
                    next.push(candidate);
                }
            }
        }
        matches = next;
    }
    matches
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::{stub_bin, write_file};
    use std::time::Duration;

    fn runner_in(dir: &std::path::Path) -> CommandRunner {
        CommandRunner::new(Duration::from_secs(5)).with_search_path(dir)
    }

    #[tokio::test]
    async fn counts_raw_newlines_of_present_managers_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        stub_bin(dir.path(), "pacman", r"printf 'bash\ncoreutils\nlinux\n'");
        stub_bin(dir.path(), "rpm", r"printf 'a\nb\nc'");
        let managers = [
            cmd("pacman", "pacman", &["-Qq"]),
            cmd("rpm", "rpm", &["-qa"]),
            cmd("apk", "apk", &["info"]),
        ];

        let pkgs = collect_packages(&runner_in(dir.path()), &managers).await;
        assert_eq!(
            pkgs,
            vec![("pacman".to_string(), 3), ("rpm".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn gate_binary_may_differ_from_listing_program() {
        let dir = tempfile::tempdir().expect("tempdir");
        stub_bin(dir.path(), "sorcery", "exit 0");
        stub_bin(dir.path(), "gaze", r"printf 'one\ntwo\n'");
        let pkgs = collect_packages(&runner_in(dir.path()), &[cmd("sorcery", "gaze", &["installed"])]).await;
        assert_eq!(pkgs, vec![("sorcery".to_string(), 2)]);
    }

    #[tokio::test]
    async fn failing_listing_still_counts_its_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        stub_bin(dir.path(), "opkg", "exit 1");
        let pkgs = collect_packages(&runner_in(dir.path()), &[cmd("opkg", "opkg", &[])]).await;
        assert_eq!(pkgs, vec![("opkg".to_string(), 0)]);
    }

    #[test]
    fn dir_pattern_counts_entries_of_each_match() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("pkg");
        write_file(&root.join("sys-apps/coreutils-9.4/CONTENTS"), "");
        write_file(&root.join("sys-apps/coreutils-9.4/.keep"), "");
        write_file(&root.join("sys-apps/bash-5.2/CONTENTS"), "");
        write_file(&root.join("dev-lang/rust-1.80/CONTENTS"), "");
        write_file(&root.join(".hidden/ignored/CONTENTS"), "");

        let pattern = format!("{}/*/*", root.display());
        assert_eq!(expand_pattern(&pattern).len(), 3);
        assert_eq!(count_dir_entries(&pattern), 4);
        assert_eq!(count_dir_entries(&format!("{}/*/bash-5.2", root.display())), 1);
        assert_eq!(count_dir_entries("/definitely/not/here/*"), 0);
    }

    #[tokio::test]
    async fn brew_counts_cellar_and_caskroom() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cellar = dir.path().join("Cellar");
        let caskroom = dir.path().join("Caskroom");
        write_file(&cellar.join("git/2.45.0/bin/git"), "");
        write_file(&cellar.join("wget/1.24/bin/wget"), "");
        write_file(&cellar.join("wget/1.25/bin/wget"), "");
        write_file(&caskroom.join("firefox/128.0/Firefox.app"), "");
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).expect("bin dir");
        stub_bin(
            &bin,
            "brew",
            &format!(
                "case \"$1\" in --cellar) printf '%s\\n' '{}';; --caskroom) printf '%s\\n' '{}';; esac",
                cellar.display(),
                caskroom.display()
            ),
        );

        let managers = [PackageManager {
            name: "brew",
            source: ListSource::Brew,
        }];
        let pkgs = collect_packages(&runner_in(&bin), &managers).await;
        assert_eq!(pkgs, vec![("brew".to_string(), 4)]);
    }

    #[test]
    fn table_covers_every_known_manager() {
        assert_eq!(PACKAGE_MANAGERS.len(), 29);
        let dpkg = PACKAGE_MANAGERS
            .iter()
            .find(|m| m.name == "dpkg")
            .expect("dpkg entry");
        assert!(matches!(
            dpkg.source,
            ListSource::Command("dpkg-query", ["-f", ".\n", "-W"])
        ));
    }
}
