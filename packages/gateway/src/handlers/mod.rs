pub mod push;
pub mod ws;

pub async fn health() -> &'static str {
    "ok"
}
