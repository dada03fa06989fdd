//! `prowl chat` — one conversational turn with session continuity.

use prowl_sessions::{Session, SessionStore};

pub async fn run(
    message: String,
    session_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = super::build_runtime().await?;

    let store = SessionStore::new(runtime.config.data_dir().join("sessions"));
    let mut session = match &session_id {
        Some(id) => store
            .load(id)?
            .unwrap_or_else(|| Session::with_id(id.clone())),
        None => Session::new(),
    };

    if !session.messages.is_empty() {
        runtime.agent.restore_log(session.messages.clone());
    }

    let answer = runtime.agent.run(message).await?;

    session.messages = runtime.agent.log_snapshot();
    store.save(&mut session)?;

    println!("{answer}");
    println!();
    println!("(session: {})", session.id);

    Ok(())
}
