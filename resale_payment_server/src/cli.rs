use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 22] = [
        "RUST_LOG",
        "RPG_HOST",
        "RPG_PORT",
        "RPG_DATABASE_URL",
        "RPG_DB_MAX_CONNECTIONS",
        "RPG_CURRENCY",
        "RPG_USD_TO_BRL",
        "RPG_SHIPPING_COST",
        "RPG_TAX_RATE",
        "RPG_MARGIN_RATE",
        "RPG_FEE_INSTALLMENT",
        "RPG_FEE_CARD_SINGLE",
        "RPG_FEE_INSTANT",
        "RPG_ROUNDING_UNIT",
        "RPG_PUBLIC_BASE_URL",
        "RPG_MERCADOPAGO_API_URL",
        "RPG_MERCADOPAGO_TIMEOUT_SECONDS",
        "RPG_MERCADOPAGO_WEBHOOK_STRICT",
        "RPG_MERCADOPAGO_WEBHOOK_TOLERANCE_SECONDS",
        "RPG_MERCADOPAGO_SUCCESS_URL",
        "RPG_MERCADOPAGO_PENDING_URL",
        "RPG_MERCADOPAGO_FAILURE_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<42} {val:<15}");
    })
}
