use super::Connection;

/// Owns a group of connections that are torn down together
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    connections: Vec<Connection>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Disconnects every held connection
    pub fn clear(&mut self) {
        for connection in self.connections.drain(..) {
            connection.disconnect();
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Extend<Connection> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Connection>>(&mut self, iter: I) {
        self.connections.extend(iter);
    }
}
