use crate::client::ListResponse;
use crate::creator::{new_id, ConcurrentResourceCreator};
use crate::error::Result;
use std::future::Future;
use std::time::{Duration, Instant};

/// Await a list call and log how long the manager took to answer it
pub async fn get_resource_list<T, Fut>(resource_name: &str, list: Fut) -> Result<ListResponse<T>>
where
    Fut: Future<Output = Result<ListResponse<T>>>,
{
    let start = Instant::now();
    let resources = list.await?;
    tracing::info!(
        resource = resource_name,
        total = resources.total(),
        "{} list took {:.2} seconds",
        resource_name,
        start.elapsed().as_secs_f64()
    );
    Ok(resources)
}

/// Create a single deployment and report how long it took
pub async fn create_one_deployment(
    creator: &mut ConcurrentResourceCreator,
    blueprint_id: &str,
) -> Result<Duration> {
    let inputs = creator.blueprint_example_mut().inputs()?;
    let deployment_id = new_id();

    let start = Instant::now();
    creator
        .client()
        .create_deployment(blueprint_id, &deployment_id, inputs.as_ref())
        .await?;
    let elapsed = start.elapsed();

    tracing::info!(
        deployment_id = %deployment_id,
        "Creating one deployment took {:.2} seconds",
        elapsed.as_secs_f64()
    );
    Ok(elapsed)
}
