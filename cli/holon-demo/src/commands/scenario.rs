//! Scenario command - the person walkthrough.

use anyhow::{ensure, Result};
use clap::Args;
use holon_object::{FieldMap, ObjectClass, ObjectOps, Record, RuntimeConfig};
use serde_json::json;
use tracing::info;

use crate::types;

/// Walk through get/set/merge on a person object.
#[derive(Debug, Args)]
pub struct ScenarioCommand {
    /// First name to start with.
    #[arg(long, default_value = "Bob")]
    first: String,

    /// Last name to start with.
    #[arg(long, default_value = "Jones")]
    last: String,
}

impl ScenarioCommand {
    pub async fn run(self, config: RuntimeConfig) -> Result<()> {
        let class = ObjectClass::new(types::person()?).with_config(config);

        let obj = class
            .spawn([("first", json!(self.first)), ("last", json!(self.last))])
            .await?;
        info!(object_id = %obj.id(), "Spawned person");
        print_step("new", &obj)?;
        println!("name = {}", obj.get_field("name").await?.unwrap_or_default());

        let obj = obj.set("name", json!("Carl Young")).await?;
        print_step("set name", &obj)?;

        let mut changes = FieldMap::new();
        changes.insert("age".into(), json!(40));
        changes.insert("name".into(), json!("Dan West"));
        let obj = obj.merge(changes).await?;
        print_step("merge age+name", &obj)?;

        let values = obj.get_fields(&["first", "last", "age"]).await?;
        ensure!(
            values == [Some(json!("Dan")), Some(json!("West")), Some(json!(40))],
            "unexpected field values: {values:?}"
        );

        obj.close().await?;
        println!("closed; alive = {}", obj.is_alive());
        Ok(())
    }
}

fn print_step(step: &str, record: &Record) -> Result<()> {
    println!("{step:>16}: {}", serde_json::to_string(record)?);
    Ok(())
}
