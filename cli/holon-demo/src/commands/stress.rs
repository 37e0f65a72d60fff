//! Stress command - concurrent read-modify-write on shared counters.

use std::time::Instant;

use anyhow::{ensure, Result};
use clap::Args;
use holon_object::{FieldMap, ObjectClass, ObjectOps, RuntimeConfig, Value};
use serde_json::json;
use tracing::{debug, info};

use crate::types;

/// Apply concurrent updates to several counters and verify the totals.
#[derive(Debug, Args)]
pub struct StressCommand {
    /// Number of counter objects.
    #[arg(long, default_value_t = 8)]
    objects: usize,

    /// Increments applied to each object.
    #[arg(long, default_value_t = 1000)]
    updates: usize,

    /// Use casts instead of calls for the increments.
    #[arg(long)]
    cast: bool,
}

impl StressCommand {
    pub async fn run(self, config: RuntimeConfig) -> Result<()> {
        let class = ObjectClass::new(types::counter()?).with_config(config);

        let mut counters = Vec::with_capacity(self.objects);
        for _ in 0..self.objects {
            counters.push(class.spawn_default().await?);
        }

        let started = Instant::now();
        let mut tasks = Vec::with_capacity(self.objects * self.updates);
        for counter in &counters {
            for _ in 0..self.updates {
                let handle = counter.identity().clone();
                let cast = self.cast;
                tasks.push(tokio::spawn(async move {
                    if cast {
                        handle.cast_merge_lazy(increment).await
                    } else {
                        handle.merge_lazy(increment).await.map(|_| ())
                    }
                }));
            }
        }
        for task in tasks {
            task.await??;
        }

        for counter in &counters {
            let count = counter.get_field("count").await?;
            debug!(object_id = %counter.id(), count = ?count, "Counter settled");
            ensure!(
                count == Some(json!(self.updates)),
                "counter {} lost updates: {count:?}",
                counter.id()
            );
            counter.close().await?;
        }

        let elapsed = started.elapsed();
        info!(
            objects = self.objects,
            updates = self.updates,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stress run complete"
        );
        println!(
            "{} objects x {} updates in {:?}: no lost updates",
            self.objects, self.updates, elapsed
        );
        Ok(())
    }
}

fn increment(record: &holon_object::Record) -> FieldMap {
    let count = record.field("count").and_then(Value::as_i64).unwrap_or(0);
    let mut changes = FieldMap::new();
    changes.insert("count".into(), json!(count + 1));
    changes
}
