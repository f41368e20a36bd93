//! Command dispatch (spec §4.10 "Command set"): routes one [`ParsedRequest`]
//! to the matching [`FsDbManager`] method and renders the result.

use fsal_core::{EntryType, FsalError};
use fsal_manager::FsDbManager;
use fsal_query::{DescendantQuery, DescendantsResult};
use fsal_store::Order;
use tokio_stream::StreamExt;

use crate::request::ParsedRequest;
use crate::response::{render_dirs_and_files, render_entry, Response};
use crate::xml::Element;

/// Dispatches one parsed request and renders its response document (without
/// the NUL terminator, which the server adds on the wire).
pub async fn dispatch(manager: &FsDbManager, req: &ParsedRequest) -> Vec<u8> {
    let response = handle(manager, req).await;
    response.render()
}

async fn handle(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    match req.command.as_str() {
        "LIST_DIR" => list_dir(manager, req).await,
        "LIST_DESCENDANTS" => list_descendants(manager, req).await,
        "LIST_BASE_PATHS" => list_base_paths(manager),
        "EXISTS" => exists(manager, req).await,
        "ISDIR" => isdir(manager, req).await,
        "ISFILE" => isfile(manager, req).await,
        "REMOVE" => remove(manager, req).await,
        "SEARCH" => search(manager, req).await,
        "FILTER" => filter(manager, req).await,
        "GET_FSO" => get_fso(manager, req).await,
        "TRANSFER" => transfer(manager, req).await,
        "CONSOLIDATE" => consolidate(manager, req).await,
        "GET_CHANGES" => get_changes(manager, req).await,
        "CONFIRM_CHANGES" => confirm_changes(manager, req).await,
        "REFRESH" => refresh(manager),
        "REFRESH_PATH" => refresh_path(manager, req),
        "SET_WHITELIST" => set_whitelist(manager, req).await,
        "GET_PATH_SIZE" => get_path_size(manager, req).await,
        other => Response::error(format!("unknown command: {other}")),
    }
}

fn required(req: &ParsedRequest, key: &str) -> Result<&str, FsalError> {
    req.require_str(key)
}

async fn list_dir(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p,
        Err(e) => return Response::error(e.to_string()),
    };
    match manager.list_dir(path).await {
        Ok((ok, children)) => Response::ok_if(ok).with_params(render_dirs_and_files(&children)),
        Err(e) => Response::error(e.to_string()),
    }
}

fn parse_order(raw: Option<&str>) -> Order {
    match raw {
        Some("path_desc") => Order::PathDesc,
        Some("mtime_asc") => Order::ModifyTimeAsc,
        Some("mtime_desc") => Order::ModifyTimeDesc,
        _ => Order::PathAsc,
    }
}

fn parse_entry_type(raw: Option<&str>) -> Option<EntryType> {
    match raw {
        Some("file") => Some(EntryType::File),
        Some("dir") => Some(EntryType::Dir),
        _ => None,
    }
}

async fn list_descendants(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p.to_string(),
        Err(e) => return Response::error(e.to_string()),
    };

    let query = DescendantQuery {
        path,
        count: req.bool("count", false),
        offset: req.u64("offset").unwrap_or(0),
        limit: req.u64("limit"),
        order: parse_order(req.str("order")),
        span_days: req.i64("span"),
        entry_type: parse_entry_type(req.str("entry_type")),
        ignored_paths: req.list("ignored_paths"),
    };

    match manager.list_descendants(query).await {
        Ok(DescendantsResult::NotFound) => Response::ok_if(false),
        Ok(DescendantsResult::Count(n)) => Response::ok().with_count(n),
        Ok(DescendantsResult::Entries(mut stream)) => {
            let mut rows = Vec::new();
            while let Some(row) = stream.next().await {
                match row {
                    Ok(entry) => rows.push(entry),
                    Err(e) => return Response::error(e.to_string()),
                }
            }
            Response::ok().with_params(render_dirs_and_files(&rows))
        }
        Err(e) => Response::error(e.to_string()),
    }
}

fn list_base_paths(manager: &FsDbManager) -> Response {
    let paths: Vec<Element> = manager
        .list_base_paths()
        .into_iter()
        .map(|p| Element::leaf("path", p))
        .collect();
    Response::ok().with_params(vec![Element::parent("base_paths", paths)])
}

async fn exists(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p,
        Err(e) => return Response::error(e.to_string()),
    };
    let unindexed = req.bool("unindexed", false);
    match manager.exists(path, unindexed).await {
        Ok(b) => Response::ok().with_params(vec![Element::leaf("exists", bool_str(b))]),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn isdir(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p,
        Err(e) => return Response::error(e.to_string()),
    };
    match manager.is_dir(path).await {
        Ok(b) => Response::ok().with_params(vec![Element::leaf("isdir", bool_str(b))]),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn isfile(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p,
        Err(e) => return Response::error(e.to_string()),
    };
    match manager.is_file(path).await {
        Ok(b) => Response::ok().with_params(vec![Element::leaf("isfile", bool_str(b))]),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn remove(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p,
        Err(e) => return Response::error(e.to_string()),
    };
    match manager.remove(path).await {
        Ok(()) => Response::ok(),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn search(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let query = match required(req, "query") {
        Ok(q) => q,
        Err(e) => return Response::error(e.to_string()),
    };
    let whole_words = req.bool("whole_words", false);
    let excludes = req.list("excludes");
    match manager.search(query, whole_words, excludes).await {
        Ok((is_match, rows)) => Response::ok()
            .with_is_match(is_match)
            .with_params(render_dirs_and_files(&rows)),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn filter(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let paths = req.list("paths");
    match manager.filter(paths).await {
        Ok(rows) => Response::ok().with_params(render_dirs_and_files(&rows)),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn get_fso(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p,
        Err(e) => return Response::error(e.to_string()),
    };
    match manager.get_fso(path).await {
        Ok(Some(entry)) => Response::ok().with_params(vec![render_entry(&entry)]),
        Ok(None) => Response::error(format!("not found: {path}")),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn transfer(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let (src, dest) = match (required(req, "src"), required(req, "dest")) {
        (Ok(s), Ok(d)) => (s, d),
        (Err(e), _) | (_, Err(e)) => return Response::error(e.to_string()),
    };
    match manager.transfer(src, dest).await {
        Ok(()) => Response::ok(),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn consolidate(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let sources = req.list("sources");
    let dest = match required(req, "dest") {
        Ok(d) => d.to_string(),
        Err(e) => return Response::error(e.to_string()),
    };
    let outcome = manager.consolidate(sources, dest).await;
    let mut response = Response::ok_if(outcome.success).with_is_partial(outcome.is_partial);
    if let Some(message) = outcome.message {
        response = response.with_error(message);
    }
    response
}

async fn get_changes(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let limit = req.u64("limit").unwrap_or(u64::MAX) as usize;
    let events = manager.get_changes(limit).await;
    Response::ok().with_events(events)
}

async fn confirm_changes(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let limit = req.u64("limit").unwrap_or(u64::MAX) as usize;
    manager.confirm_changes(limit).await;
    Response::ok()
}

fn refresh(manager: &FsDbManager) -> Response {
    manager.refresh();
    Response::ok()
}

fn refresh_path(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p,
        Err(e) => return Response::error(e.to_string()),
    };
    match manager.refresh_path(path) {
        Ok(()) => Response::ok(),
        Err(e) => Response::error(e.to_string()),
    }
}

async fn set_whitelist(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let paths = req.list("paths");
    manager.set_whitelist(paths).await;
    Response::ok()
}

async fn get_path_size(manager: &FsDbManager, req: &ParsedRequest) -> Response {
    let path = match required(req, "path") {
        Ok(p) => p,
        Err(e) => return Response::error(e.to_string()),
    };
    match manager.get_path_size(path).await {
        Ok((ok, size)) => Response::ok_if(ok).with_params(vec![Element::leaf("size", size.to_string())]),
        Err(e) => Response::error(e.to_string()),
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsal_manager::ManagerConfig;
    use tempfile::tempdir;

    async fn manager_over(root: &std::path::Path) -> FsDbManager {
        let (manager, _join) = FsDbManager::open(ManagerConfig::single_base(root)).await.unwrap();
        manager
    }

    fn request(xml: &str) -> ParsedRequest {
        ParsedRequest::parse(xml.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn list_dir_of_root_before_any_refresh_is_empty() {
        let dir = tempdir().unwrap();
        let manager = manager_over(dir.path()).await;
        let req = request("<request><command><type>LIST_DIR</type><params><path>.</path></params></command></request>");
        let bytes = dispatch(&manager, &req).await;
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<success>true</success>"));
        assert!(xml.contains("<dirs/>") || xml.contains("<dirs></dirs>"));
    }

    #[tokio::test]
    async fn list_dir_missing_path_param_is_a_protocol_error() {
        let dir = tempdir().unwrap();
        let manager = manager_over(dir.path()).await;
        let req = request("<request><command><type>LIST_DIR</type><params/></command></request>");
        let bytes = dispatch(&manager, &req).await;
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<success>false</success>"));
        assert!(xml.contains("<error>"));
    }

    #[tokio::test]
    async fn get_fso_of_unknown_path_reports_failure() {
        let dir = tempdir().unwrap();
        let manager = manager_over(dir.path()).await;
        let req = request("<request><command><type>GET_FSO</type><params><path>missing</path></params></command></request>");
        let bytes = dispatch(&manager, &req).await;
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<success>false</success>"));
    }

    #[tokio::test]
    async fn unknown_command_is_reported_as_an_error() {
        let dir = tempdir().unwrap();
        let manager = manager_over(dir.path()).await;
        let req = request("<request><command><type>BOGUS</type><params/></command></request>");
        let bytes = dispatch(&manager, &req).await;
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("unknown command"));
    }

    #[tokio::test]
    async fn refresh_acknowledges_immediately() {
        let dir = tempdir().unwrap();
        let manager = manager_over(dir.path()).await;
        let req = request("<request><command><type>REFRESH</type><params/></command></request>");
        let bytes = dispatch(&manager, &req).await;
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains("<success>true</success>"));
    }
}
