/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

pub fn rate_limit_key(ip: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, ip)
}
