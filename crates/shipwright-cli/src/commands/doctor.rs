use std::path::Path;

use shipwright::{CONFIG_FILE, RuntimeEnv, ShipwrightConfig};
use shipwright_build::ResourceDefinition;
use shipwright_cloud::{CheckResult, NamedCheck, RealExecutor};

pub async fn doctor(project_dir: &Path) -> anyhow::Result<()> {
    let runtime = RuntimeEnv::load();
    let expected_account = runtime
        .as_ref()
        // arch-lint: allow(no-silent-result-drop) reason="doctor must report tool checks even when AWS_ACCOUNT_ID is unset"
        .ok()
        .map(|r| r.account_id.as_str());

    let mut report = shipwright_cloud::doctor(&RealExecutor, expected_account).await;

    // Config file check
    let config = if project_dir.join(CONFIG_FILE).exists() {
        match ShipwrightConfig::load(project_dir) {
            Ok(config) => {
                report.config_file = CheckResult::ok("Found");
                Some(config)
            }
            Err(e) => {
                report.config_file = CheckResult::fail(&e.to_string());
                None
            }
        }
    } else {
        report.config_file = CheckResult::fail("Not found (run: shipwright init)");
        None
    };

    // One template per configured environment
    if let Some(config) = &config {
        for (name, env_config) in &config.environments {
            let result = match name.parse() {
                Ok(env) => check_template(&config.template_path(project_dir, env), &env_config.family),
                Err(e) => CheckResult::fail(&e.to_string()),
            };
            report.templates.push(NamedCheck {
                name: format!("template: {name}"),
                result,
            });
        }
    }

    println!();
    println!("{report}");
    if let Err(e) = &runtime {
        println!("  [NG] {:<18} {e}", "environment");
    }

    if !report.all_passed() || runtime.is_err() {
        anyhow::bail!("some checks failed — see above for details");
    }

    Ok(())
}

fn check_template(path: &Path, family: &str) -> CheckResult {
    let definition = match ResourceDefinition::load(path) {
        Ok(d) => d,
        Err(e) => return CheckResult::fail(&e.to_string()),
    };
    if let Err(e) = definition.validate() {
        return CheckResult::fail(&e.to_string());
    }
    match definition.family() {
        Some(f) if f == family => CheckResult::ok(&path.display().to_string()),
        found => CheckResult::fail(&format!("family {found:?}, expected '{family}'")),
    }
}
