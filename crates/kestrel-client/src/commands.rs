//! Typed command wrappers.
//!
//! Thin, mechanical glue: each wrapper builds an argument list, names a
//! [`RequestType`] and awaits the multiplexer. Semantics live server-side;
//! return values are whatever the runtime decoded, so callers narrow the
//! [`Value`] themselves.

use kestrel_proto::RequestType;
use kestrel_runtime::Value;

use crate::client::Client;
use crate::errors::Error;
use crate::routes::Route;

impl Client {
    pub async fn get(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Get, vec![key.into()], None)
            .await
    }

    pub async fn set(
        &self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Result<Value, Error> {
        self.execute_command(RequestType::Set, vec![key.into(), value.into()], None)
            .await
    }

    pub async fn getdel(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::GetDel, vec![key.into()], None)
            .await
    }

    pub async fn del(&self, keys: Vec<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Del, keys, None).await
    }

    pub async fn exists(&self, keys: Vec<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Exists, keys, None).await
    }

    pub async fn expire(
        &self,
        key: impl Into<Vec<u8>>,
        seconds: i64,
    ) -> Result<Value, Error> {
        self.execute_command(
            RequestType::Expire,
            vec![key.into(), seconds.to_string().into_bytes()],
            None,
        )
        .await
    }

    pub async fn ttl(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Ttl, vec![key.into()], None)
            .await
    }

    pub async fn persist(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Persist, vec![key.into()], None)
            .await
    }

    pub async fn incr(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Incr, vec![key.into()], None)
            .await
    }

    pub async fn incr_by(
        &self,
        key: impl Into<Vec<u8>>,
        amount: i64,
    ) -> Result<Value, Error> {
        self.execute_command(
            RequestType::IncrBy,
            vec![key.into(), amount.to_string().into_bytes()],
            None,
        )
        .await
    }

    pub async fn decr(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Decr, vec![key.into()], None)
            .await
    }

    pub async fn decr_by(
        &self,
        key: impl Into<Vec<u8>>,
        amount: i64,
    ) -> Result<Value, Error> {
        self.execute_command(
            RequestType::DecrBy,
            vec![key.into(), amount.to_string().into_bytes()],
            None,
        )
        .await
    }

    pub async fn mget(&self, keys: Vec<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::MGet, keys, None).await
    }

    pub async fn mset(&self, key_value_pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<Value, Error> {
        let mut args = Vec::with_capacity(key_value_pairs.len() * 2);
        for (key, value) in key_value_pairs {
            args.push(key);
            args.push(value);
        }
        self.execute_command(RequestType::MSet, args, None).await
    }

    pub async fn append(
        &self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Result<Value, Error> {
        self.execute_command(RequestType::Append, vec![key.into(), value.into()], None)
            .await
    }

    pub async fn strlen(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Strlen, vec![key.into()], None)
            .await
    }

    pub async fn hget(
        &self,
        key: impl Into<Vec<u8>>,
        field: impl Into<Vec<u8>>,
    ) -> Result<Value, Error> {
        self.execute_command(RequestType::HGet, vec![key.into(), field.into()], None)
            .await
    }

    pub async fn hset(
        &self,
        key: impl Into<Vec<u8>>,
        field_value_pairs: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<Value, Error> {
        let mut args = Vec::with_capacity(1 + field_value_pairs.len() * 2);
        args.push(key.into());
        for (field, value) in field_value_pairs {
            args.push(field);
            args.push(value);
        }
        self.execute_command(RequestType::HSet, args, None).await
    }

    pub async fn hdel(
        &self,
        key: impl Into<Vec<u8>>,
        fields: Vec<Vec<u8>>,
    ) -> Result<Value, Error> {
        let mut args = vec![key.into()];
        args.extend(fields);
        self.execute_command(RequestType::HDel, args, None).await
    }

    pub async fn hgetall(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::HGetAll, vec![key.into()], None)
            .await
    }

    pub async fn hexists(
        &self,
        key: impl Into<Vec<u8>>,
        field: impl Into<Vec<u8>>,
    ) -> Result<Value, Error> {
        self.execute_command(RequestType::HExists, vec![key.into(), field.into()], None)
            .await
    }

    pub async fn hlen(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::HLen, vec![key.into()], None)
            .await
    }

    pub async fn lpush(
        &self,
        key: impl Into<Vec<u8>>,
        elements: Vec<Vec<u8>>,
    ) -> Result<Value, Error> {
        let mut args = vec![key.into()];
        args.extend(elements);
        self.execute_command(RequestType::LPush, args, None).await
    }

    pub async fn rpush(
        &self,
        key: impl Into<Vec<u8>>,
        elements: Vec<Vec<u8>>,
    ) -> Result<Value, Error> {
        let mut args = vec![key.into()];
        args.extend(elements);
        self.execute_command(RequestType::RPush, args, None).await
    }

    pub async fn lpop(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::LPop, vec![key.into()], None)
            .await
    }

    pub async fn rpop(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::RPop, vec![key.into()], None)
            .await
    }

    pub async fn lrange(
        &self,
        key: impl Into<Vec<u8>>,
        start: i64,
        end: i64,
    ) -> Result<Value, Error> {
        self.execute_command(
            RequestType::LRange,
            vec![
                key.into(),
                start.to_string().into_bytes(),
                end.to_string().into_bytes(),
            ],
            None,
        )
        .await
    }

    pub async fn llen(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::LLen, vec![key.into()], None)
            .await
    }

    pub async fn sadd(
        &self,
        key: impl Into<Vec<u8>>,
        members: Vec<Vec<u8>>,
    ) -> Result<Value, Error> {
        let mut args = vec![key.into()];
        args.extend(members);
        self.execute_command(RequestType::SAdd, args, None).await
    }

    pub async fn srem(
        &self,
        key: impl Into<Vec<u8>>,
        members: Vec<Vec<u8>>,
    ) -> Result<Value, Error> {
        let mut args = vec![key.into()];
        args.extend(members);
        self.execute_command(RequestType::SRem, args, None).await
    }

    pub async fn smembers(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::SMembers, vec![key.into()], None)
            .await
    }

    pub async fn scard(&self, key: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::SCard, vec![key.into()], None)
            .await
    }

    pub async fn ping(&self) -> Result<Value, Error> {
        self.execute_command(RequestType::Ping, Vec::new(), None)
            .await
    }

    pub async fn echo(&self, message: impl Into<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::Echo, vec![message.into()], None)
            .await
    }

    /// INFO, optionally routed to specific cluster nodes.
    pub async fn info(&self, route: Option<Route>) -> Result<Value, Error> {
        self.execute_command(RequestType::Info, Vec::new(), route)
            .await
    }

    /// Change the logical database. Standalone only.
    pub async fn select(&self, index: u32) -> Result<Value, Error> {
        self.execute_command(
            RequestType::Select,
            vec![index.to_string().into_bytes()],
            None,
        )
        .await
    }

    pub async fn config_get(&self, parameters: Vec<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::ConfigGet, parameters, None)
            .await
    }

    pub async fn config_set(
        &self,
        parameter_value_pairs: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<Value, Error> {
        let mut args = Vec::with_capacity(parameter_value_pairs.len() * 2);
        for (parameter, value) in parameter_value_pairs {
            args.push(parameter);
            args.push(value);
        }
        self.execute_command(RequestType::ConfigSet, args, None)
            .await
    }

    pub async fn dbsize(&self) -> Result<Value, Error> {
        self.execute_command(RequestType::DbSize, Vec::new(), None)
            .await
    }

    pub async fn flushall(&self) -> Result<Value, Error> {
        self.execute_command(RequestType::FlushAll, Vec::new(), None)
            .await
    }

    pub async fn time(&self) -> Result<Value, Error> {
        self.execute_command(RequestType::Time, Vec::new(), None)
            .await
    }

    pub async fn publish(
        &self,
        channel: impl Into<Vec<u8>>,
        message: impl Into<Vec<u8>>,
    ) -> Result<Value, Error> {
        self.execute_command(
            RequestType::Publish,
            vec![channel.into(), message.into()],
            None,
        )
        .await
    }

    /// Sharded pub/sub publish.
    pub async fn spublish(
        &self,
        channel: impl Into<Vec<u8>>,
        message: impl Into<Vec<u8>>,
    ) -> Result<Value, Error> {
        self.execute_command(
            RequestType::SPublish,
            vec![channel.into(), message.into()],
            None,
        )
        .await
    }

    /// Invoke a loaded script by SHA1 hash.
    pub async fn invoke_script(
        &self,
        hash: &str,
        keys: Vec<Vec<u8>>,
        args: Vec<Vec<u8>>,
    ) -> Result<Value, Error> {
        self.execute_script(hash, keys, args, None).await
    }

    /// Pass an arbitrary command through verbatim, e.g.
    /// `["SETRANGE", "key", "5", "value"]`.
    pub async fn custom_command(&self, args: Vec<Vec<u8>>) -> Result<Value, Error> {
        self.execute_command(RequestType::CustomCommand, args, None)
            .await
    }

    /// Run a batch built with [`Batch`]. With `raise_on_error`, the first
    /// failing sub-command is raised instead of embedded in the result list.
    pub async fn exec(&self, batch: Batch, raise_on_error: bool) -> Result<Value, Error> {
        self.execute_batch(
            batch.commands,
            batch.is_atomic,
            raise_on_error,
            false,
            false,
            None,
            None,
        )
        .await
    }
}

/// An ordered list of commands submitted as one request.
///
/// Atomic batches run as a transaction; non-atomic batches are a pipeline.
/// Either way the whole batch occupies one callback slot and resolves with a
/// single list of sub-results.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    commands: Vec<(RequestType, Vec<Vec<u8>>)>,
    is_atomic: bool,
}

impl Batch {
    pub fn new(is_atomic: bool) -> Self {
        Self {
            commands: Vec::new(),
            is_atomic,
        }
    }

    pub fn is_atomic(&self) -> bool {
        self.is_atomic
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Append an arbitrary command.
    pub fn add(&mut self, request_type: RequestType, args: Vec<Vec<u8>>) -> &mut Self {
        self.commands.push((request_type, args));
        self
    }

    pub fn get(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.add(RequestType::Get, vec![key.into()])
    }

    pub fn set(
        &mut self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.add(RequestType::Set, vec![key.into(), value.into()])
    }

    pub fn incr(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.add(RequestType::Incr, vec![key.into()])
    }

    pub fn del(&mut self, keys: Vec<Vec<u8>>) -> &mut Self {
        self.add(RequestType::Del, keys)
    }

    pub fn custom_command(&mut self, args: Vec<Vec<u8>>) -> &mut Self {
        self.add(RequestType::CustomCommand, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_builder_preserves_order() {
        let mut batch = Batch::new(true);
        batch.set("k", "1").incr("k").get("k");

        assert!(batch.is_atomic());
        assert_eq!(batch.len(), 3);
        assert_eq!(
            batch.commands[0],
            (RequestType::Set, vec![b"k".to_vec(), b"1".to_vec()])
        );
        assert_eq!(batch.commands[1], (RequestType::Incr, vec![b"k".to_vec()]));
        assert_eq!(batch.commands[2], (RequestType::Get, vec![b"k".to_vec()]));
    }

    #[test]
    fn empty_batch_is_empty() {
        let batch = Batch::new(false);
        assert!(batch.is_empty());
        assert!(!batch.is_atomic());
    }
}
