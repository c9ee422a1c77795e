use anyhow::{Context, Result};
use colored::Colorize;

use crate::models::Waypoint;
use crate::store::Store;

pub fn list_waypoints(store: &Store, server: Option<&str>, json: bool) -> Result<()> {
    let waypoints: Vec<Waypoint> = store
        .waypoints()
        .into_iter()
        .filter(|w| server.map_or(true, |s| w.server.as_deref() == Some(s)))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&waypoints)?);
        return Ok(());
    }
    if waypoints.is_empty() {
        println!("{}", "No waypoints saved".yellow());
    }
    for waypoint in &waypoints {
        println!(
            "{:<20} {:>7} {:>5} {:>7}  {}",
            waypoint.name.bright_white().bold(),
            waypoint.x,
            waypoint.y,
            waypoint.z,
            waypoint.server.as_deref().unwrap_or("").dimmed()
        );
    }
    Ok(())
}

/// Save a waypoint from explicit coordinates or pasted game text.
pub fn add_waypoint(
    store: &mut Store,
    name: String,
    server: Option<String>,
    coordinates: Option<(i64, i64, i64)>,
    pasted: Option<&str>,
) -> Result<()> {
    let (x, y, z) = match (coordinates, pasted) {
        (Some(coordinates), _) => coordinates,
        (None, Some(text)) => Waypoint::parse_coordinates(text)
            .context("No coordinates found in pasted text")?,
        (None, None) => anyhow::bail!("Provide coordinates or --paste text"),
    };

    store.add_waypoint(Waypoint {
        name: name.clone(),
        server,
        x,
        y,
        z,
    })?;
    println!("{} {} ({}, {}, {})", "✓ Saved".green(), name.bold(), x, y, z);
    Ok(())
}
