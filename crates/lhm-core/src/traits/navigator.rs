// # Navigator Trait
//
// Opens a server's URL in a new top-level browsing context. Nothing is
// returned to the registry; the only failure reported is being unable to hand
// the URL off at all.

use std::process::{Command, Stdio};

/// Trait for navigation collaborators
pub trait Navigator: Send + Sync {
    /// Open `url` in a new browser tab or window
    fn open_in_new_context(&self, url: &str) -> Result<(), crate::Error>;
}

/// Navigator that delegates to the platform URL opener
///
/// `xdg-open` on Linux, `open` on macOS, `cmd /c start` on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNavigator;

impl SystemNavigator {
    fn command(url: &str) -> Command {
        let (program, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
            ("open", &[])
        } else if cfg!(windows) {
            ("cmd", &["/c", "start", ""])
        } else {
            ("xdg-open", &[])
        };

        let mut cmd = Command::new(program);
        cmd.args(args).arg(url);
        cmd
    }
}

impl Navigator for SystemNavigator {
    fn open_in_new_context(&self, url: &str) -> Result<(), crate::Error> {
        tracing::debug!("Opening {}", url);

        Self::command(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| crate::Error::navigation(format!("Failed to open {}: {}", url, e)))
    }
}
