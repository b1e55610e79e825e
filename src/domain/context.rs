use uuid::Uuid;

/// 每个入口显式携带的调用上下文, 取代从请求环境隐式读取的当前用户与来源 IP
#[derive(Debug, Clone)]
pub struct CallContext {
    pub caller: Option<Uuid>,
    pub client_ip: String,
    pub locale: String,
}

impl CallContext {
    pub fn new(caller: Option<Uuid>, client_ip: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            caller,
            client_ip: client_ip.into(),
            locale: locale.into(),
        }
    }

    /// 服务器内部发起的调用 (回调通道, 后台任务)
    pub fn anonymous(client_ip: impl Into<String>) -> Self {
        Self {
            caller: None,
            client_ip: client_ip.into(),
            locale: "vn".to_string(),
        }
    }
}
