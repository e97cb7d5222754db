// check.rs — Preflight diagnostics for a deployment.
//
// Exits non-zero when the config is invalid, a generator script is
// missing, or an interpreter cannot be found on PATH. A missing default
// base file is only a warning: uploads still work without it.

use std::collections::HashMap;

use vf_daemon::DaemonConfig;

pub fn execute(config: &DaemonConfig) -> anyhow::Result<()> {
    let mut problems = 0usize;

    match config.validate() {
        Ok(()) => println!("config          ok"),
        Err(e) => {
            println!("config          INVALID: {}", e);
            problems += 1;
        }
    }

    println!("scripts dir     {}", config.scripts_dir.display());
    println!("work root       {}", config.work_root.display());

    let base = config.default_base_path();
    if base.is_file() {
        println!("default base    {}", base.display());
    } else {
        println!(
            "default base    missing ({}); requests must upload a file",
            base.display()
        );
    }

    println!("generators      {}", config.generators.len());
    let mut resolved: HashMap<&str, Option<String>> = HashMap::new();
    for spec in &config.generators {
        let present = config.scripts_dir.join(&spec.name).is_file();
        if !present {
            problems += 1;
        }

        let runner = match spec.interpreter.as_deref() {
            Some(interpreter) => {
                let found = resolved.entry(interpreter).or_insert_with(|| {
                    which::which(interpreter)
                        .ok()
                        .map(|p| p.display().to_string())
                });
                match found {
                    Some(path) => format!("{} ({})", interpreter, path),
                    None => {
                        problems += 1;
                        format!("{} (NOT FOUND on PATH)", interpreter)
                    }
                }
            }
            None => "executed directly".to_string(),
        };

        let state = if present { "ok" } else { "MISSING" };
        println!("  {:<8} {:<45} {}", state, spec.name, runner);
    }

    if problems > 0 {
        anyhow::bail!("{} problem(s) found", problems);
    }
    println!("All checks passed.");
    Ok(())
}
