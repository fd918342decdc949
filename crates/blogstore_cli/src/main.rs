//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `blogstore_core` linkage and one save/load round trip in memory.
//! - Keep output deterministic for quick local sanity checks.

use blogstore_core::{Blog, BlogStore, EntityRepository, Post, RepoResult, Tag};
use chrono::{TimeZone, Utc};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    println!("blogstore_core ping={}", blogstore_core::ping());
    println!("blogstore_core version={}", blogstore_core::core_version());

    match round_trip().await {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("round_trip status=error error={err}");
            ExitCode::FAILURE
        }
    }
}

async fn round_trip() -> RepoResult<String> {
    let store = BlogStore::open_in_memory()?;
    let blog = store.blogs().save(Blog::new("smoke", "smk")).await?;
    let first = store.tags().save(Tag::new("rust")).await?;
    let second = store.tags().save(Tag::new("sqlite")).await?;

    let date = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let mut post = Post::new("hello", date).with_content("first post");
    post.blog = blog.id.map(Blog::reference);
    post.tags = [first.id, second.id].into_iter().flatten().collect();

    let saved = store.posts().save(post).await?;
    let id = saved.id.unwrap_or_default();
    let loaded = store.posts().find_by_id(id).await?;

    Ok(match loaded {
        Some(post) => format!(
            "round_trip status=ok post_id={id} blog_id={:?} tags={:?}",
            post.blog_id(),
            post.tags
        ),
        None => format!("round_trip status=missing post_id={id}"),
    })
}
