/// Read-through caching around an async provider call.
///
/// Looks the key up in Redis first. On a miss it awaits `$block`, queues the
/// result for a background write with the given TTL (seconds), and returns it.
/// A failed cache read is logged and treated as a miss, so an unreachable
/// Redis never stops the provider from being called.
///
/// # Example
/// ```rust,ignore
/// let tracks: Vec<CatalogTrack> = cached!(self.cache, key, SEARCH_CACHE_TTL, async {
///     self.search_artist(term).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let hit = match $cache.get_from_cache(&$key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %$key, error = %e, "Cache read failed, calling provider");
                None
            }
        };

        if let Some(cached) = hit {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
