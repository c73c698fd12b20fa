//! External program invocation: pre/post-reload hooks and notify-program
//! (spec §4.5, §6). Failures are logged and non-fatal.

use tokio::process::Command;

pub struct HookRunner {
    pre_reload: Option<String>,
    post_reload: Option<String>,
    notify_program: Option<String>,
}

impl HookRunner {
    pub fn new(
        pre_reload: Option<String>,
        post_reload: Option<String>,
        notify_program: Option<String>,
    ) -> Self {
        HookRunner {
            pre_reload,
            post_reload,
            notify_program,
        }
    }

    pub async fn run_pre_reload(&self, feed_url: &str, unattended: bool) {
        if unattended {
            return;
        }
        if let Some(cmd) = &self.pre_reload {
            run_shell(cmd, &[("FEED_URL", feed_url)]).await;
        }
    }

    pub async fn run_post_reload(&self, feed_url: &str, unattended: bool) {
        if unattended {
            return;
        }
        if let Some(cmd) = &self.post_reload {
            run_shell(cmd, &[("FEED_URL", feed_url)]).await;
        }
    }

    /// Runs `notify-program` with the formatted "N new articles" message.
    pub async fn notify(&self, message: &str) {
        if let Some(cmd) = &self.notify_program {
            run_shell(cmd, &[("NEWSBOAT_MESSAGE", message)]).await;
        }
    }
}

async fn run_shell(cmd: &str, env: &[(&str, &str)]) {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    for (k, v) in env {
        command.env(k, v);
    }
    match command.status().await {
        Ok(status) if !status.success() => {
            tracing::warn!(cmd, code = ?status.code(), "hook exited non-zero");
        }
        Err(e) => tracing::warn!(cmd, error = %e, "failed to spawn hook"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unattended_skips_reload_hooks() {
        let runner = HookRunner::new(
            Some("touch /nonexistent/should-not-run".into()),
            None,
            None,
        );
        runner.run_pre_reload("https://a", true).await;
    }
}
