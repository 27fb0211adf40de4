pub(crate) fn append_to_path<I>(url: &reqwest::Url, parts: I) -> reqwest::Url
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut dst_url = url.clone();
    dst_url
        .path_segments_mut()
        .expect("can be a base")
        .extend(parts);
    dst_url
}

/// Follows `pageToken`s until the service stops handing them out, collecting every item.
pub(crate) async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, crate::error::ClientError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<(Vec<T>, Option<String>), crate::error::ClientError>>,
{
    let mut items = Vec::new();
    let mut page_token = None;

    loop {
        let (mut page, next_page_token) = fetch_page(page_token.take()).await?;
        items.append(&mut page);

        match next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => return Ok(items),
        }
    }
}
