use anyhow::Result;
use serde::Serialize;

use crate::output;

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorOut {
    pub ok: bool,
    pub checks: Vec<Check>,
}

pub async fn run() -> Result<()> {
    let mut checks = Vec::new();

    checks.push(Check {
        name: "SEMINDEX_API_KEY".to_string(),
        ok: std::env::var(semindex_server::config::API_KEY_ENV).is_ok(),
        detail: "required for any operation that touches the Context Engine".to_string(),
    });
    checks.push(Check {
        name: "SEMINDEX_API_URL".to_string(),
        ok: std::env::var(semindex_server::config::API_URL_ENV).is_ok(),
        detail: "required for any operation that touches the Context Engine".to_string(),
    });

    let store_root = semindex_store::paths::default_store_root("semindex");
    checks.push(Check {
        name: "store path".to_string(),
        ok: store_root.is_ok(),
        detail: store_root.map(|p| p.display().to_string()).unwrap_or_else(|e| e.to_string()),
    });

    for (token_env, label) in [
        (semindex_sources::factory::env::GITHUB_TOKEN, "github token"),
        (semindex_sources::factory::env::GITLAB_TOKEN, "gitlab token"),
        (semindex_sources::factory::env::BITBUCKET_TOKEN, "bitbucket token"),
    ] {
        checks.push(Check {
            name: token_env.to_string(),
            ok: true,
            detail: if std::env::var(token_env).is_ok() { format!("{label} set") } else { format!("{label} unset (optional, required for private repos)") },
        });
    }

    let ok = checks.iter().filter(|c| !c.name.ends_with("_TOKEN")).all(|c| c.ok);
    output::print(&DoctorOut { ok, checks })?;
    Ok(())
}
