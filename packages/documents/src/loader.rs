//! Reading state documents from a directory or a remote base URL.

use std::path::Path;

use futures::future::join_all;
use rmp_facility_models::states::STATE_ABBRS;

use crate::DocumentError;
use crate::document::StateDocument;
use crate::paths;

/// Reads every `*.json` document in `<data_dir>/by-state/`, in file name
/// order.
///
/// # Errors
///
/// * If the directory cannot be listed
/// * If any document cannot be read or parsed
pub async fn load_directory(data_dir: &Path) -> Result<Vec<StateDocument>, DocumentError> {
    let dir = paths::by_state_dir(data_dir);
    let mut entries = tokio::fs::read_dir(&dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let body = tokio::fs::read_to_string(&path).await?;
        let document: StateDocument =
            serde_json::from_str(&body).map_err(|e| DocumentError::Parse {
                source_name: path.display().to_string(),
                message: e.to_string(),
            })?;
        documents.push(document);
    }

    log::info!(
        "Loaded {} state documents from {}",
        documents.len(),
        dir.display()
    );

    Ok(documents)
}

/// Fetches one state's document.
///
/// # Errors
///
/// * If the request fails or returns a non-success status
/// * If the body is not a valid state document
pub async fn fetch_state(
    client: &reqwest::Client,
    base_url: &str,
    abbr: &str,
) -> Result<StateDocument, DocumentError> {
    let url = paths::state_url(base_url, abbr);
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        return Err(DocumentError::Status {
            url,
            status: resp.status().as_u16(),
        });
    }
    let body = resp.text().await?;

    serde_json::from_str(&body).map_err(|e| DocumentError::Parse {
        source_name: url,
        message: e.to_string(),
    })
}

/// Fetches all 50 states and DC concurrently. A state that fails to load
/// is logged and left out.
///
/// # Errors
///
/// * If not a single state could be fetched
pub async fn load_remote(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<Vec<StateDocument>, DocumentError> {
    let results = join_all(
        STATE_ABBRS
            .iter()
            .map(|abbr| async move { (*abbr, fetch_state(client, base_url, abbr).await) }),
    )
    .await;

    let documents: Vec<StateDocument> = results
        .into_iter()
        .filter_map(|(abbr, result)| match result {
            Ok(document) => Some(document),
            Err(e) => {
                log::warn!("Skipping state {abbr}: {e}");
                None
            }
        })
        .collect();

    if documents.is_empty() {
        return Err(DocumentError::NoDocuments {
            base_url: base_url.to_string(),
        });
    }

    log::info!(
        "Fetched {}/{} state documents from {base_url}",
        documents.len(),
        STATE_ABBRS.len()
    );

    Ok(documents)
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    /// Serves `/OH.json` once `ready` is set and 404 for everything else.
    /// Returns the base URL.
    pub async fn serve_ohio(ready: Arc<AtomicBool>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let ready = Arc::clone(&ready);
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0_u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        let Ok(n) = socket.read(&mut buf).await else {
                            return;
                        };
                        if n == 0 {
                            break;
                        }
                        request.extend_from_slice(&buf[..n]);
                    }
                    let request = String::from_utf8_lossy(&request);
                    let path = request.split_whitespace().nth(1).unwrap_or_default();

                    let (status, body) = if path == "/OH.json" && ready.load(Ordering::SeqCst) {
                        ("200 OK", r#"{"abbr":"OH","name":"Ohio","counties":[]}"#)
                    } else {
                        ("404 Not Found", "")
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        base
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let dir = std::env::temp_dir().join("rmp_documents_test_missing");
        let _ = std::fs::remove_dir_all(&dir);

        let err = load_directory(&dir).await.unwrap_err();
        assert!(matches!(err, DocumentError::Io(_)));
    }

    #[tokio::test]
    async fn reads_only_json_files_in_name_order() {
        let dir = std::env::temp_dir().join("rmp_documents_test_dir");
        let _ = std::fs::remove_dir_all(&dir);
        let by_state = paths::by_state_dir(&dir);
        std::fs::create_dir_all(&by_state).unwrap();
        std::fs::write(by_state.join("WV.json"), r#"{"abbr":"WV","counties":[]}"#).unwrap();
        std::fs::write(by_state.join("OH.json"), r#"{"abbr":"OH","counties":[]}"#).unwrap();
        std::fs::write(by_state.join("README.txt"), "not a document").unwrap();

        let docs = load_directory(&dir).await.unwrap();
        let abbrs: Vec<&str> = docs.iter().map(|d| d.abbr.as_str()).collect();
        assert_eq!(abbrs, vec!["OH", "WV"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn malformed_document_names_the_file() {
        let dir = std::env::temp_dir().join("rmp_documents_test_bad");
        let _ = std::fs::remove_dir_all(&dir);
        let by_state = paths::by_state_dir(&dir);
        std::fs::create_dir_all(&by_state).unwrap();
        std::fs::write(by_state.join("OH.json"), "{ nope").unwrap();

        let err = load_directory(&dir).await.unwrap_err();
        assert!(err.to_string().contains("OH.json"), "{err}");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn unreachable_remote_is_an_error() {
        let client = reqwest::Client::new();
        let err = load_remote(&client, "http://127.0.0.1:9").await.unwrap_err();
        assert!(
            matches!(err, DocumentError::NoDocuments { ref base_url } if base_url == "http://127.0.0.1:9")
        );
    }

    #[tokio::test]
    async fn remote_load_keeps_the_states_that_answered() {
        let base = test_server::serve_ohio(Arc::new(AtomicBool::new(true))).await;
        let client = reqwest::Client::new();

        let docs = load_remote(&client, &format!("{base}/")).await.unwrap();
        let abbrs: Vec<&str> = docs.iter().map(|d| d.abbr.as_str()).collect();
        assert_eq!(abbrs, vec!["OH"]);
    }
}
