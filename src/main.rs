#[rocket::main]
async fn main() -> anyhow::Result<()> {
    khazad_lib::run().await
}
