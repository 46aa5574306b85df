use std::path::Path;

use shipwright::{CONFIG_FILE, Environment};

/// Scaffold shipwright in an existing project, skipping files that exist.
pub fn init_project(project_dir: &Path) -> anyhow::Result<()> {
    let name = project_dir
        .canonicalize()?
        .file_name()
        .and_then(|n| n.to_str())
        .map(service_name)
        .unwrap_or_else(|| "app".to_owned());

    let mut created = Vec::new();

    let config_path = project_dir.join(CONFIG_FILE);
    if config_path.exists() {
        eprintln!("{CONFIG_FILE} already exists, skipping");
    } else {
        std::fs::write(&config_path, config_template(&name))?;
        created.push(CONFIG_FILE.to_owned());
    }

    for env in Environment::ALL {
        let relative = format!("deploy/{env}/definition.json");
        let path = project_dir.join(&relative);
        if path.exists() {
            eprintln!("{relative} already exists, skipping");
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, definition_template(&name, env))?;
        created.push(relative);
    }

    let env_example = project_dir.join(".env.example");
    if env_example.exists() {
        eprintln!(".env.example already exists, skipping");
    } else {
        std::fs::write(
            &env_example,
            format!("AWS_ACCOUNT_ID=123456789012\nAWS_DEFAULT_REGION=us-east-1\nIMAGE_REPO_NAME={name}\n"),
        )?;
        created.push(".env.example".to_owned());
    }

    if created.is_empty() {
        println!("Nothing to create — already initialized.");
    } else {
        for f in &created {
            println!("Created {f}");
        }
    }

    println!();
    println!("Next steps:");
    println!();
    println!("  1. Point [environments.*] at your clusters and services in {CONFIG_FILE}");
    println!("  2. Configure credentials:");
    println!("     cp .env.example .env");
    println!("  3. Check the setup:");
    println!("     shipwright doctor");
    println!("  4. Deploy:");
    println!("     shipwright deploy --environment staging");

    Ok(())
}

/// Lowercase letters, digits and hyphens, as accepted for service and
/// definition family names.
fn service_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else if !name.ends_with('-') && !name.is_empty() {
            name.push('-');
        }
    }
    let name: String = name.chars().take(200).collect();
    match name.trim_end_matches('-') {
        "" => "app".to_owned(),
        trimmed => trimmed.to_owned(),
    }
}

fn config_template(name: &str) -> String {
    let mut out = format!(
        r#"[project]
container_name = "app"
# template_dir = "deploy"

[build]
# context = "."
# dockerfile = "Dockerfile"
# build_args = {{ RUST_VERSION = "1.85" }}

[registry]
# tag_template = "{{revision}}"
# push_latest = true
# max_attempts = 3

[deploy]
# timeout_secs = 600
# poll_interval_secs = 10

[lease]
# mode = "fail-fast"   # or "wait"
# wait_timeout_secs = 300
"#
    );
    for env in Environment::ALL {
        out.push_str(&format!(
            "\n[environments.{env}]\ncluster = \"{name}-{env}\"\nservice = \"{name}\"\nfamily = \"{name}-{env}\"\n# repository = \"{name}\"\n"
        ));
    }
    out
}

fn definition_template(name: &str, env: Environment) -> String {
    format!(
        r#"{{
  "family": "{name}-{env}",
  "networkMode": "awsvpc",
  "requiresCompatibilities": ["FARGATE"],
  "cpu": "256",
  "memory": "512",
  "containerDefinitions": [
    {{
      "name": "app",
      "image": "replaced-on-deploy",
      "essential": true,
      "portMappings": [{{ "containerPort": 8080, "protocol": "tcp" }}],
      "environment": [{{ "name": "ENVIRONMENT", "value": "{env}" }}]
    }}
  ]
}}
"#
    )
}
