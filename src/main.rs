use star_ratings_be::models::TargetRegistry;

#[tokio::main]
async fn main() {
    star_ratings_be::start_server(TargetRegistry::new()).await;
}
