use rand::{distributions::Alphanumeric, thread_rng, Rng};

const PAPER_ID_LENGTH: usize = 16;

fn random_alphanumeric(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Opaque public identifier of a composed paper.
pub fn generate_paper_id() -> String {
    format!("paper_{}", random_alphanumeric(PAPER_ID_LENGTH).to_lowercase())
}
