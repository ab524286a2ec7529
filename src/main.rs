//! parley server binary.

#[tokio::main]
async fn main() {
    parley::web::run().await;
}
