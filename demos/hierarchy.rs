//! # Bus hierarchy
//!
//! Demonstrates:
//! - Broadcasting down the tree (root → children → grandchildren)
//! - Broadcasting one hop up (child → parent)
//! - Awaited results gathered from a whole subtree
//! - Cascading disposal
//!
//! Run with: `cargo run --example hierarchy`

use canopy::{BoxError, Bus, ChildOptions, Direction, Topic, TopicOptions};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = Bus::new();
    let editor = app.create_child(ChildOptions::default())?;
    let sidebar = app.create_child(ChildOptions::default())?;
    let toolbar = editor.create_child(ChildOptions::default())?;

    let theme: Topic<String> = Topic::new("theme.changed");
    let clicked: Topic<&'static str> = Topic::with_options(
        "ui.clicked",
        TopicOptions {
            direction: Direction::Parent,
        },
    );
    let dirty: Topic<(), bool> = Topic::new("doc.dirty?");

    for (name, bus) in [("app", &app), ("editor", &editor), ("sidebar", &sidebar), ("toolbar", &toolbar)] {
        let _ = bus.subscribe(&theme, move |t: String| {
            println!("🎨 {name}: theme is now {t}");
            Ok::<_, BoxError>(())
        })?;
        let _ = bus.subscribe(&clicked, move |button: &'static str| {
            println!("🖱️  {name}: saw click on {button}");
            Ok::<_, BoxError>(())
        })?;
    }

    // app, editor, sidebar, toolbar
    app.publish(&theme, "dark".to_string())?;
    app.flush().await;

    // toolbar, then editor only
    toolbar.publish(&clicked, "bold")?;
    app.flush().await;

    let _e = editor.subscribe(&dirty, |_: ()| Ok::<_, BoxError>(true))?;
    let _s = sidebar.subscribe(&dirty, |_: ()| Ok::<_, BoxError>(false))?;
    let answers = app.signal_await(&dirty)?.await?;
    println!("💾 unsaved changes: {}", answers.iter().any(|dirty| *dirty));

    editor.dispose();
    println!(
        "🧹 editor disposed: toolbar disposed = {}, app children = {}",
        toolbar.is_disposed(),
        app.children().len()
    );
    Ok(())
}
