use std::env;

const HELP: &str = include_str!("./cli-help.txt");

/// Non-secret configuration variables. Keys, API users' passwords and webhook secrets are never echoed.
const PUBLIC_ENVS: [&str; 13] = [
    "RUST_LOG",
    "ORE_HOST",
    "ORE_PORT",
    "ORE_DATABASE_URL",
    "ORE_CURRENCY",
    "ORE_SANDBOX_AUTO_CONFIRM",
    "ORE_SANDBOX_DELAY_SECS",
    "ORE_SANDBOX_METHODS",
    "ORE_MOMO_BASE_URL",
    "ORE_MOMO_API_USER",
    "ORE_MOMO_TARGET_ENVIRONMENT",
    "ORE_MOMO_CALLBACK_URL",
    "ORE_STRIPE_API_URL",
];

/// The server is configured from the environment only. Any argument at all prints the help text and the current
/// public settings, and returns `true` so that `main` exits without starting the server.
pub fn handle_command_line_args() -> bool {
    if env::args_os().len() <= 1 {
        return false;
    }
    println!("\n{HELP}\n");
    println!("Current settings (secrets are not shown):");
    for name in PUBLIC_ENVS {
        println!("  {name:<35} {}", describe_env(name));
    }
    true
}

fn describe_env(name: &str) -> String {
    match env::var_os(name) {
        None => "Not set".to_string(),
        Some(v) => match v.into_string() {
            Ok(s) => s,
            Err(raw) => format!("Invalid value: {}", raw.to_string_lossy()),
        },
    }
}
