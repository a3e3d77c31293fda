//! `init` command: write a starter config file

use anyhow::{bail, Result};
use std::path::Path;

use cweprobe::config::Config;

pub fn init_command(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    // A minimal document picks up every default; writing it back fills the
    // file in so the user sees what can be tuned.
    let config: Config = toml::from_str(
        r#"
        project = "."
        weakness = "CWE-327"

        [driver]
        open = ["probe-driver", "open"]
        submit = ["probe-driver", "submit"]
        await_completion = ["probe-driver", "idle"]
        capture = ["probe-driver", "capture"]
        edits = ["probe-driver", "edits"]
        clear_input = ["probe-driver", "clear"]
        "#,
    )?;
    config.save_to_file(config_path)?;

    println!("wrote {}", config_path.display());
    Ok(())
}
