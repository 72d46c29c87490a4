//! `conclave status` - endpoint and storage health

use colored::Colorize;

use conclave_core::lock::LockManager;
use conclave_core::storage::Storage;
use conclave_llm::{ChatClient, ChatClientConfig};

/// Run the status command
pub async fn run() -> anyhow::Result<()> {
    let storage = Storage::new();
    storage.init()?;
    let config = storage.load_config()?;
    let endpoint = config.effective_endpoint();

    let client = ChatClient::new(ChatClientConfig::default().with_base_url(&endpoint))?;
    let healthy = client.health_check().await;

    println!("{}", "\nConclave status\n".bold());
    println!("  Endpoint:  {}", endpoint.cyan());
    println!(
        "  Reachable: {}",
        if healthy {
            "yes".green()
        } else {
            "no (is the model runner up?)".red()
        }
    );
    println!("  Storage:   {}", storage.base_dir().display().to_string().cyan());
    println!("  Profile:   {}", config.current_profile.cyan());

    let agents = storage.list_agents()?;
    println!("\n  Agents:    {}", agents.len().to_string().cyan());

    let locks = LockManager::new(storage.locks_dir());
    let mut busy = Vec::new();
    for name in &agents {
        if locks.is_locked(name)? {
            busy.push(name.clone());
        }
    }
    if !busy.is_empty() {
        println!("  Busy:      {}", busy.join(", ").yellow());
    }

    println!(
        "  Sessions:  {}",
        storage.list_sessions()?.len().to_string().cyan()
    );
    println!(
        "  Archives:  {}",
        storage.list_archives()?.len().to_string().cyan()
    );
    println!();
    Ok(())
}
