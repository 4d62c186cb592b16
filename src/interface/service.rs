use crate::api::AppError;
use crate::clock::now_millis;
use crate::interface::model::{ApiInterface, InterfaceStatus};
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait InterfaceStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<ApiInterface>, AppError>;

    /// Ids that do not resolve are silently absent from the result.
    async fn batch_get(&self, ids: Vec<String>) -> Result<Vec<ApiInterface>, AppError>;

    async fn create(&self, interface: ApiInterface) -> Result<ApiInterface, AppError>;

    async fn update_status(
        &self,
        id: &str,
        status: InterfaceStatus,
        updated_at: u64,
    ) -> Result<Option<ApiInterface>, AppError>;
}

pub async fn register_interface(
    store: &dyn InterfaceStore,
    mut interface: ApiInterface,
) -> Result<ApiInterface, AppError> {
    interface.validate()?;
    let now = now_millis();
    interface.created_at = now;
    interface.updated_at = now;
    let interface = store.create(interface).await?;
    info!("registered interface {} ({})", interface.name, interface.id);
    Ok(interface)
}

pub async fn copy_interface(store: &dyn InterfaceStore, id: &str) -> Result<Option<ApiInterface>, AppError> {
    match store.get(id).await? {
        Some(original) => {
            let copy = store.create(original.copy_of()).await?;
            info!("copied interface {} into {}", id, copy.id);
            Ok(Some(copy))
        }
        None => Ok(None),
    }
}

pub async fn change_status(
    store: &dyn InterfaceStore,
    id: &str,
    status: InterfaceStatus,
) -> Result<Option<ApiInterface>, AppError> {
    let updated = store.update_status(id, status, now_millis()).await?;
    if updated.is_some() {
        info!("interface {} is now {:?}", id, status);
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::interface::model::{ApiParam, ParamKind};
    use crate::persistence::memory::MemoryRepository;

    fn interface() -> ApiInterface {
        ApiInterface::builder()
            .name("weather")
            .method(HttpMethod::GET)
            .url("https://api.example.com/weather")
            .build()
    }

    #[tokio::test]
    async fn register_rejects_invalid_definitions() {
        let store = MemoryRepository::new();
        let mut invalid = interface();
        invalid.params = vec![
            ApiParam::builder().name("city").kind(ParamKind::UrlParam).build(),
            ApiParam::builder().name("city").kind(ParamKind::UrlParam).build(),
        ];
        assert!(matches!(
            register_interface(&store, invalid).await,
            Err(AppError::Validation(_))
        ));

        let stored = register_interface(&store, interface()).await.unwrap();
        assert_eq!(store.get(&stored.id).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn copy_is_stored_alongside_the_original() {
        let store = MemoryRepository::new();
        let original = register_interface(&store, interface()).await.unwrap();
        let copy = copy_interface(&store, &original.id).await.unwrap().unwrap();
        assert_eq!(copy.name, "weather_copy");
        assert_eq!(store.batch_get(vec![original.id.clone(), copy.id.clone()]).await.unwrap().len(), 2);
        assert_eq!(copy_interface(&store, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn status_change_is_persisted() {
        let store = MemoryRepository::new();
        let original = register_interface(&store, interface()).await.unwrap();
        let updated = change_status(&store, &original.id, InterfaceStatus::Disabled)
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_enabled());
        assert!(!store.get(&original.id).await.unwrap().unwrap().is_enabled());
        assert_eq!(
            change_status(&store, "missing", InterfaceStatus::Enabled).await.unwrap(),
            None
        );
    }
}
