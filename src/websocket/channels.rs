//! WebSocket Channel Definitions

/// Subscribable channels: all trades/orderbooks, or one symbol via
/// `trades:BTC-USDT` / `orderbook:BTC-USDT`
pub enum Channel {
    Trades(Option<String>),
    Orderbook(Option<String>),
}

impl Channel {
    pub fn parse(channel_str: &str) -> Option<Self> {
        match channel_str.split_once(':') {
            Some(("trades", symbol)) if !symbol.is_empty() => {
                Some(Channel::Trades(Some(symbol.to_string())))
            }
            Some(("orderbook", symbol)) if !symbol.is_empty() => {
                Some(Channel::Orderbook(Some(symbol.to_string())))
            }
            None if channel_str == "trades" => Some(Channel::Trades(None)),
            None if channel_str == "orderbook" => Some(Channel::Orderbook(None)),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match self {
            Channel::Trades(symbol) | Channel::Orderbook(symbol) => symbol.as_deref(),
        }
    }
}

/// True when a subscription set covers an event on `symbol` for `kind`
/// (`"trades"` or `"orderbook"`)
pub fn covers(subscriptions: &std::collections::HashSet<String>, kind: &str, symbol: &str) -> bool {
    subscriptions.contains(kind) || subscriptions.contains(&format!("{kind}:{symbol}"))
}
