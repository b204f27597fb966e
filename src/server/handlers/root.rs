pub async fn home() -> &'static str {
    "Webhook Processor"
}
