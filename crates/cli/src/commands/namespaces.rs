//! `kvbulk namespaces` — list the account's namespaces.

use super::CommandContext;

pub async fn list(ctx: &CommandContext) -> anyhow::Result<i32> {
    let namespaces = ctx.client.list_namespaces().await?;
    if namespaces.is_empty() {
        eprintln!("no namespaces found");
        return Ok(0);
    }
    for namespace in namespaces {
        println!("{}\t{}", namespace.id, namespace.title);
    }
    Ok(0)
}
