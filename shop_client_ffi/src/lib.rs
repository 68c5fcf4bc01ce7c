//! 电商客户端 FFI 绑定
//!
//! 提供 C ABI 兼容的接口，供移动端宿主调用。所有操作在内部运行时上阻塞执行，
//! 结果写入状态容器，宿主通过 `*_state_json` 读取最新状态。

use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;
use std::sync::Arc;

use shop_client_core::{
    ApiClient, AuthService, CatalogContainer, CatalogQuery, ClientConfig, FileStore, MemoryStore,
    ProductService, SecureStore, SessionContainer, SessionState, SignupRequest,
};
use tokio::runtime::Runtime;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// 错误码定义
pub const SHOP_OK: c_int = 0;
pub const SHOP_ERR_NULL_PTR: c_int = -1;
pub const SHOP_ERR_INVALID_PARAM: c_int = -2;
pub const SHOP_ERR_RUNTIME: c_int = -3;
pub const SHOP_ERR_REQUEST: c_int = -4;
pub const SHOP_ERR_ENCODING: c_int = -5;

/// 客户端句柄
pub struct ShopClient {
    runtime: Runtime,
    session: SessionContainer,
    catalog: CatalogContainer,
}

/// 读取可空的 C 字符串参数
fn optional_str<'a>(value: *const c_char) -> Result<Option<&'a str>, c_int> {
    if value.is_null() {
        return Ok(None);
    }
    let c_str = unsafe { CStr::from_ptr(value) };
    c_str.to_str().map(Some).map_err(|_| SHOP_ERR_ENCODING)
}

/// 读取必填的 C 字符串参数
fn required_str<'a>(value: *const c_char) -> Result<&'a str, c_int> {
    optional_str(value)?.ok_or(SHOP_ERR_NULL_PTR)
}

fn into_c_string(value: String) -> *mut c_char {
    match CString::new(value) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn build_client(base_url: Option<&str>, storage_dir: Option<&str>) -> Result<ShopClient, c_int> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|_| SHOP_ERR_RUNTIME)?;

    let store: Arc<dyn SecureStore> = match storage_dir {
        Some(dir) => Arc::new(FileStore::new(dir)),
        None => Arc::new(MemoryStore::new()),
    };

    let mut config = ClientConfig::default();
    if let Some(base_url) = base_url {
        config.base_url = base_url.to_string();
    }

    // reqwest 客户端需要在运行时上下文中创建
    let client = {
        let _guard = runtime.enter();
        ApiClient::new(config, store.clone()).map_err(|e| {
            warn!("Failed to create client: {}", e);
            SHOP_ERR_INVALID_PARAM
        })?
    };
    let client = Arc::new(client);

    let auth = Arc::new(AuthService::new(client.clone(), store));
    let products = Arc::new(ProductService::new(client));

    Ok(ShopClient {
        runtime,
        session: SessionContainer::new(auth),
        catalog: CatalogContainer::new(products),
    })
}

/// 创建客户端
///
/// `base_url` 为空时使用默认演示 API；`storage_dir` 为空时凭证只保存在内存中。
#[no_mangle]
pub extern "C" fn shop_client_new(base_url: *const c_char, storage_dir: *const c_char) -> *mut ShopClient {
    let base_url = match optional_str(base_url) {
        Ok(value) => value,
        Err(_) => return ptr::null_mut(),
    };
    let storage_dir = match optional_str(storage_dir) {
        Ok(value) => value,
        Err(_) => return ptr::null_mut(),
    };

    match build_client(base_url, storage_dir) {
        Ok(client) => Box::into_raw(Box::new(client)),
        Err(_) => ptr::null_mut(),
    }
}

/// 销毁客户端
#[no_mangle]
pub extern "C" fn shop_client_free(client: *mut ShopClient) {
    if !client.is_null() {
        unsafe {
            drop(Box::from_raw(client));
        }
    }
}

/// 初始化日志，`filter` 为空时使用 `info`；重复调用无副作用
#[no_mangle]
pub extern "C" fn shop_client_init_logging(filter: *const c_char) -> c_int {
    let filter = match optional_str(filter) {
        Ok(value) => value.unwrap_or("info"),
        Err(code) => return code,
    };

    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    SHOP_OK
}

/// 用户登录，失败时会话状态为 `failed`
#[no_mangle]
pub extern "C" fn shop_client_login(
    client: *const ShopClient,
    username: *const c_char,
    password: *const c_char,
) -> c_int {
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };
    let (username, password) = match (required_str(username), required_str(password)) {
        (Ok(username), Ok(password)) => (username, password),
        (Err(code), _) | (_, Err(code)) => return code,
    };

    client.runtime.block_on(client.session.login(username, password));
    session_status(&client.session.state())
}

/// 用户注册，`first_name` 和 `last_name` 可为空
#[no_mangle]
pub extern "C" fn shop_client_signup(
    client: *const ShopClient,
    username: *const c_char,
    email: *const c_char,
    password: *const c_char,
    first_name: *const c_char,
    last_name: *const c_char,
) -> c_int {
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };

    let request = match build_signup(username, email, password, first_name, last_name) {
        Ok(request) => request,
        Err(code) => return code,
    };

    match client.runtime.block_on(client.session.signup(&request)) {
        Some(_) => SHOP_OK,
        None => SHOP_ERR_REQUEST,
    }
}

fn build_signup(
    username: *const c_char,
    email: *const c_char,
    password: *const c_char,
    first_name: *const c_char,
    last_name: *const c_char,
) -> Result<SignupRequest, c_int> {
    Ok(SignupRequest {
        username: required_str(username)?.to_string(),
        email: required_str(email)?.to_string(),
        password: required_str(password)?.to_string(),
        first_name: optional_str(first_name)?.map(str::to_string),
        last_name: optional_str(last_name)?.map(str::to_string),
    })
}

/// 用户登出
#[no_mangle]
pub extern "C" fn shop_client_logout(client: *const ShopClient) -> c_int {
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };
    client.runtime.block_on(client.session.logout());
    SHOP_OK
}

/// 启动时恢复会话
#[no_mangle]
pub extern "C" fn shop_client_restore_session(client: *const ShopClient) -> c_int {
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };
    client.runtime.block_on(client.session.restore_session());
    SHOP_OK
}

/// 加载首页
#[no_mangle]
pub extern "C" fn shop_client_catalog_load_first_page(client: *const ShopClient) -> c_int {
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };
    client.runtime.block_on(client.catalog.load_first_page());
    catalog_status(client)
}

/// 加载下一页，失败时保留已有数据
#[no_mangle]
pub extern "C" fn shop_client_catalog_load_more(client: *const ShopClient) -> c_int {
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };
    let mut errors = client.catalog.errors();
    client.runtime.block_on(client.catalog.load_more());

    match errors.try_recv() {
        Ok(_) => SHOP_ERR_REQUEST,
        Err(_) => SHOP_OK,
    }
}

/// 下拉刷新
#[no_mangle]
pub extern "C" fn shop_client_catalog_refresh(client: *const ShopClient) -> c_int {
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };
    client.runtime.block_on(client.catalog.refresh());
    catalog_status(client)
}

/// 切换到搜索结果
#[no_mangle]
pub extern "C" fn shop_client_catalog_search(client: *const ShopClient, query: *const c_char) -> c_int {
    set_catalog_query(client, query, |q| CatalogQuery::Search(q.to_string()))
}

/// 切换到分类列表，`category` 为空时回到全部商品
#[no_mangle]
pub extern "C" fn shop_client_catalog_category(client: *const ShopClient, category: *const c_char) -> c_int {
    if category.is_null() {
        if client.is_null() {
            return SHOP_ERR_NULL_PTR;
        }
        let client = unsafe { &*client };
        client.runtime.block_on(client.catalog.set_query(CatalogQuery::All));
        return catalog_status(client);
    }
    set_catalog_query(client, category, |name| CatalogQuery::Category(name.to_string()))
}

fn set_catalog_query<F>(client: *const ShopClient, value: *const c_char, make: F) -> c_int
where
    F: FnOnce(&str) -> CatalogQuery,
{
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };
    let value = match required_str(value) {
        Ok(value) => value,
        Err(code) => return code,
    };

    client.runtime.block_on(client.catalog.set_query(make(value)));
    catalog_status(client)
}

/// 加载分类列表
#[no_mangle]
pub extern "C" fn shop_client_catalog_load_categories(client: *const ShopClient) -> c_int {
    if client.is_null() {
        return SHOP_ERR_NULL_PTR;
    }
    let client = unsafe { &*client };
    client.runtime.block_on(client.catalog.load_categories());

    if client.catalog.state().categories.error().is_some() {
        SHOP_ERR_REQUEST
    } else {
        SHOP_OK
    }
}

/// 会话状态 JSON，调用方用 `shop_client_string_free` 释放
#[no_mangle]
pub extern "C" fn shop_client_session_state_json(client: *const ShopClient) -> *mut c_char {
    if client.is_null() {
        return ptr::null_mut();
    }
    let client = unsafe { &*client };
    match serde_json::to_string(&client.session.state()) {
        Ok(json) => into_c_string(json),
        Err(_) => ptr::null_mut(),
    }
}

/// 商品列表状态 JSON，调用方用 `shop_client_string_free` 释放
#[no_mangle]
pub extern "C" fn shop_client_catalog_state_json(client: *const ShopClient) -> *mut c_char {
    if client.is_null() {
        return ptr::null_mut();
    }
    let client = unsafe { &*client };
    match serde_json::to_string(&client.catalog.state()) {
        Ok(json) => into_c_string(json),
        Err(_) => ptr::null_mut(),
    }
}

/// 释放本库返回的字符串
#[no_mangle]
pub extern "C" fn shop_client_string_free(value: *mut c_char) {
    if !value.is_null() {
        unsafe {
            drop(CString::from_raw(value));
        }
    }
}

fn session_status(state: &SessionState) -> c_int {
    match state {
        SessionState::Failed(_) => SHOP_ERR_REQUEST,
        _ => SHOP_OK,
    }
}

fn catalog_status(client: &ShopClient) -> c_int {
    if client.catalog.state().products.error().is_some() {
        SHOP_ERR_REQUEST
    } else {
        SHOP_OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 指向一个已释放端口的地址，请求会被拒绝
    fn unreachable_url() -> CString {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        CString::new(format!("http://127.0.0.1:{}", port)).unwrap()
    }

    fn take_json(raw: *mut c_char) -> serde_json::Value {
        assert!(!raw.is_null());
        let text = unsafe { CStr::from_ptr(raw) }.to_str().unwrap().to_string();
        shop_client_string_free(raw);
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_client_new_free() {
        let client = shop_client_new(ptr::null(), ptr::null());
        assert!(!client.is_null());
        shop_client_free(client);

        // 空指针释放无副作用
        shop_client_free(ptr::null_mut());
        shop_client_string_free(ptr::null_mut());
    }

    #[test]
    fn test_client_new_rejects_invalid_base_url() {
        let base_url = CString::new("not a url").unwrap();
        let client = shop_client_new(base_url.as_ptr(), ptr::null());
        assert!(client.is_null());
    }

    #[test]
    fn test_null_client_is_rejected() {
        assert_eq!(shop_client_logout(ptr::null()), SHOP_ERR_NULL_PTR);
        assert_eq!(shop_client_catalog_load_more(ptr::null()), SHOP_ERR_NULL_PTR);
        assert!(shop_client_session_state_json(ptr::null()).is_null());
    }

    #[test]
    fn test_initial_states_as_json() {
        let client = shop_client_new(ptr::null(), ptr::null());

        let session = take_json(shop_client_session_state_json(client));
        assert_eq!(session, serde_json::json!({"state": "anonymous"}));

        let catalog = take_json(shop_client_catalog_state_json(client));
        assert_eq!(catalog["products"]["state"], "data");
        assert_eq!(catalog["cursor"]["total"], 0);

        shop_client_free(client);
    }

    #[test]
    fn test_login_network_failure_reported() {
        let base_url = unreachable_url();
        let client = shop_client_new(base_url.as_ptr(), ptr::null());
        let username = CString::new("emilys").unwrap();
        let password = CString::new("emilyspass").unwrap();

        let result = shop_client_login(client, username.as_ptr(), password.as_ptr());
        assert_eq!(result, SHOP_ERR_REQUEST);

        let session = take_json(shop_client_session_state_json(client));
        assert_eq!(session["state"], "failed");
        assert_eq!(session["value"]["kind"], "network");

        assert_eq!(shop_client_login(client, username.as_ptr(), ptr::null()), SHOP_ERR_NULL_PTR);
        shop_client_free(client);
    }

    #[test]
    fn test_empty_search_without_network() {
        let base_url = unreachable_url();
        let client = shop_client_new(base_url.as_ptr(), ptr::null());
        let query = CString::new("  ").unwrap();

        assert_eq!(shop_client_catalog_search(client, query.as_ptr()), SHOP_OK);
        let catalog = take_json(shop_client_catalog_state_json(client));
        assert_eq!(catalog["query"]["type"], "search");
        assert_eq!(catalog["products"]["value"], serde_json::json!([]));

        shop_client_free(client);
    }

    #[test]
    fn test_restore_with_file_store_and_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let storage_dir = CString::new(dir.path().to_str().unwrap()).unwrap();
        let client = shop_client_new(ptr::null(), storage_dir.as_ptr());

        assert_eq!(shop_client_restore_session(client), SHOP_OK);
        let session = take_json(shop_client_session_state_json(client));
        assert_eq!(session["state"], "anonymous");

        assert_eq!(shop_client_logout(client), SHOP_OK);
        shop_client_free(client);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        assert_eq!(shop_client_init_logging(ptr::null()), SHOP_OK);
        let filter = CString::new("shop_client_core=debug").unwrap();
        assert_eq!(shop_client_init_logging(filter.as_ptr()), SHOP_OK);
    }
}
