/// Generates the constructor for a client wrapping a `ResourceClient`.
#[macro_export]
macro_rules! impl_client_new {
    ($client_name:ident, $entity:ty) => {
        impl $client_name {
            pub fn new(inner: $crate::actor_framework::ResourceClient<$entity>) -> Self {
                Self { inner }
            }
        }
    };
}

/// Generates the plain read method every document client exposes.
#[macro_export]
macro_rules! impl_client_methods {
    ($client_name:ident, $entity:ty, $error:ty, get = $get:ident) => {
        impl $client_name {
            #[tracing::instrument(skip(self))]
            pub async fn $get(&self, id: String) -> Result<Option<$entity>, $error> {
                tracing::debug!("Sending request");
                self.inner.get(id).await
            }
        }
    };
}

#[macro_export]
macro_rules! impl_basic_client {
    ($client_name:ident, $entity:ty, $error:ty, get = $get:ident) => {
        $crate::impl_client_new!($client_name, $entity);
        $crate::impl_client_methods!($client_name, $entity, $error, get = $get);
    };
}
