mod store;

pub use store::{FavoriteRecord, FavoritesStore};
