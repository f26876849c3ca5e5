//! Launcher scripts that put the askpass helper behind a single path.

use std::path::Path;

use gitssh_core::env::{VAR_RESOURCES, shell_quote};

/// File name of the launcher inside the artifact directory.
#[cfg(not(windows))]
pub const LAUNCHER_NAME: &str = "gitssh-askpass.sh";
#[cfg(windows)]
pub const LAUNCHER_NAME: &str = "gitssh-askpass.cmd";

/// Render the launcher for the current platform.
pub fn render(helper: &Path, resources: &Path) -> String {
    if cfg!(windows) {
        render_cmd(helper, resources)
    } else {
        render_sh(helper, resources)
    }
}

/// POSIX shell launcher.
pub fn render_sh(helper: &Path, resources: &Path) -> String {
    format!(
        "#!/bin/sh\n{VAR_RESOURCES}={}\nexport {VAR_RESOURCES}\nexec {} \"$@\"\n",
        shell_quote(&resources.display().to_string()),
        shell_quote(&helper.display().to_string()),
    )
}

/// Windows batch launcher.
pub fn render_cmd(helper: &Path, resources: &Path) -> String {
    format!(
        "@echo off\r\nset \"{VAR_RESOURCES}={}\"\r\n\"{}\" %*\r\nexit /b %ERRORLEVEL%\r\n",
        resources.display(),
        helper.display(),
    )
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sh_launcher_exports_resources_and_forwards_args() {
        let script = render_sh(
            Path::new("/opt/gitssh/gitssh-askpass"),
            Path::new("/tmp/gitssh-1"),
        );
        assert_eq!(
            script,
            "#!/bin/sh\nGITSSH_RESOURCES=/tmp/gitssh-1\nexport GITSSH_RESOURCES\n\
             exec /opt/gitssh/gitssh-askpass \"$@\"\n"
        );
    }

    #[test]
    fn sh_launcher_quotes_awkward_paths() {
        let script = render_sh(
            Path::new("/home/o'neil/bin/gitssh-askpass"),
            Path::new("/tmp/my dir"),
        );
        assert!(script.contains("GITSSH_RESOURCES='/tmp/my dir'\n"));
        assert!(script.contains(r"exec '/home/o'\''neil/bin/gitssh-askpass' "));
    }

    #[test]
    fn cmd_launcher_uses_crlf() {
        let script = render_cmd(
            Path::new(r"C:\gitssh\gitssh-askpass.exe"),
            Path::new(r"C:\Temp\gitssh-1"),
        );
        assert!(script.starts_with("@echo off\r\n"));
        assert!(script.contains("set \"GITSSH_RESOURCES=C:\\Temp\\gitssh-1\"\r\n"));
        assert!(script.contains("\"C:\\gitssh\\gitssh-askpass.exe\" %*\r\n"));
    }
}
