pub mod annotation;
pub mod household_clustering;
pub mod split_cache;
pub mod union_find;
