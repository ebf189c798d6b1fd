//! Share-vote chaincode
//!
//! Dispatches a function name and positional string arguments to one of the
//! record handlers. Writes return no payload; reads return the stored bytes
//! untouched.

use crate::error::{FunctionKind, Result, ShareVoteError};
use crate::record::{self, check_arity, Appointment, Record, SharesHeld, Subject, Vote};
use crate::stub::ChaincodeStub;
use tracing::{debug, info, warn};

/// State key written by `init`
pub const INIT_KEY: &str = "TRY!";

/// Chaincode response payload; `None` for writes
pub type Payload = Option<Vec<u8>>;

/// The chaincode itself; all state lives behind the stub
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareVoteChaincode;

impl ShareVoteChaincode {
    pub fn new() -> Self {
        Self
    }

    /// Deployment-time initialisation: stores `args[0]` under [`INIT_KEY`]
    pub async fn init<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        check_arity(args, 1)?;
        stub.put_state(INIT_KEY, args[0].clone().into_bytes()).await?;
        Ok(None)
    }

    /// Entry point for state-changing functions
    pub async fn invoke<S: ChaincodeStub>(
        &self,
        stub: &S,
        function: &str,
        args: &[String],
    ) -> Result<Payload> {
        info!(function, "invoke is running");

        match function {
            "init" => self.init(stub, args).await,
            "write" => self.write(stub, args).await,
            "write2" => self.write2(stub, args).await,
            "write3" => self.write3(stub, args).await,
            "write4" => self.write4(stub, args).await,
            _ => {
                warn!(function, "invoke did not find func");
                Err(ShareVoteError::UnknownFunction {
                    kind: FunctionKind::Invocation,
                    function: function.to_string(),
                })
            }
        }
    }

    /// Entry point for read-only functions
    pub async fn query<S: ChaincodeStub>(
        &self,
        stub: &S,
        function: &str,
        args: &[String],
    ) -> Result<Payload> {
        info!(function, "query is running");

        match function {
            "read" => self.read(stub, args).await,
            "read2" => self.read2(stub, args).await,
            "read3" => self.read3(stub, args).await,
            "read4" => self.read4(stub, args).await,
            _ => {
                warn!(function, "query did not find func");
                Err(ShareVoteError::UnknownFunction {
                    kind: FunctionKind::Query,
                    function: function.to_string(),
                })
            }
        }
    }

    /// Store an [`Appointment`] under its name
    pub async fn write<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        write_record::<Appointment, S>(stub, args).await
    }

    /// Store a [`Vote`] under `name + subj`
    pub async fn write2<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        write_record::<Vote, S>(stub, args).await
    }

    /// Store a [`Subject`] under its number
    pub async fn write3<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        write_record::<Subject, S>(stub, args).await
    }

    /// Store a [`SharesHeld`] entry under its key
    pub async fn write4<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        write_record::<SharesHeld, S>(stub, args).await
    }

    pub async fn read<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        check_arity(args, 1)?;
        read_key(stub, &args[0]).await
    }

    /// Read a vote back by the same undelimited concatenation `write2` uses
    pub async fn read2<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        check_arity(args, 2)?;
        read_key(stub, &record::vote_key(&args[0], &args[1])).await
    }

    pub async fn read3<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        check_arity(args, 1)?;
        read_key(stub, &args[0]).await
    }

    pub async fn read4<S: ChaincodeStub>(&self, stub: &S, args: &[String]) -> Result<Payload> {
        check_arity(args, 1)?;
        read_key(stub, &args[0]).await
    }
}

async fn write_record<R: Record, S: ChaincodeStub>(stub: &S, args: &[String]) -> Result<Payload> {
    let record = R::from_args(args)?;
    let key = record.key();
    debug!(key = %key, "writing record");
    stub.put_state(&key, record.render().into_bytes()).await?;
    Ok(None)
}

async fn read_key<S: ChaincodeStub>(stub: &S, key: &str) -> Result<Payload> {
    match stub.get_state(key).await {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            debug!(key, error = %e, "get state failed");
            Err(ShareVoteError::StateRead {
                key: key.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::MemoryStub;
    use std::future::Future;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    /// Stub whose every call fails, to observe error propagation
    struct FailingStub;

    impl ChaincodeStub for FailingStub {
        fn put_state(&self, _key: &str, _value: Vec<u8>) -> impl Future<Output = Result<()>> + Send {
            async { Err(ShareVoteError::Server("ledger unavailable".to_string())) }
        }

        fn get_state(&self, _key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send {
            async { Err(ShareVoteError::Server("ledger unavailable".to_string())) }
        }
    }

    #[tokio::test]
    async fn test_init_stores_argument() {
        let cc = ShareVoteChaincode::new();
        let stub = MemoryStub::new();

        assert_eq!(cc.init(&stub, &args(&["hello"])).await.unwrap(), None);
        assert_eq!(cc.query(&stub, "read", &args(&[INIT_KEY])).await.unwrap(), Some(b"hello".to_vec()));

        // init is also reachable through invoke
        cc.invoke(&stub, "init", &args(&["again"])).await.unwrap();
        assert_eq!(stub.get_state(INIT_KEY).await.unwrap(), b"again".to_vec());
    }

    #[tokio::test]
    async fn test_write_then_read_returns_exact_bytes() {
        let cc = ShareVoteChaincode::new();
        let stub = MemoryStub::new();

        cc.invoke(&stub, "write", &args(&["alice", "2024-05-01", "09:00", "10:00"])).await.unwrap();
        let value = cc.query(&stub, "read", &args(&["alice"])).await.unwrap();
        assert_eq!(
            value,
            Some(br#"{"name": "alice", "date": "2024-05-01", "start_time": "09:00", "end_time": "10:00"}"#.to_vec())
        );

        cc.invoke(&stub, "write3", &args(&["7", "Budget", "Approve it", "ordinary"])).await.unwrap();
        let value = cc.query(&stub, "read3", &args(&["7"])).await.unwrap().unwrap();
        let subject: Subject = record::decode(&value).unwrap();
        assert_eq!(subject.title, "Budget");

        cc.invoke(&stub, "write4", &args(&["sh-1", "B-12", "carol", "300"])).await.unwrap();
        let value = cc.query(&stub, "read4", &args(&["sh-1"])).await.unwrap().unwrap();
        let shares: SharesHeld = record::decode(&value).unwrap();
        assert_eq!(shares.number_of_shares_held, "300");
    }

    #[tokio::test]
    async fn test_vote_roundtrip_uses_concatenated_key() {
        let cc = ShareVoteChaincode::new();
        let stub = MemoryStub::new();

        cc.invoke(&stub, "write2", &args(&["bob", "s1", "yes"])).await.unwrap();
        assert!(stub.exists("bobs1").await);

        let value = cc.query(&stub, "read2", &args(&["bob", "s1"])).await.unwrap();
        assert_eq!(
            value,
            Some(br#"{"key": "bobs1", "name": "bob", "subj": "s1", "vote": "yes"}"#.to_vec())
        );
    }

    #[tokio::test]
    async fn test_concatenated_keys_collide() {
        let cc = ShareVoteChaincode::new();
        let stub = MemoryStub::new();

        cc.invoke(&stub, "write2", &args(&["ab", "c", "yes"])).await.unwrap();
        cc.invoke(&stub, "write2", &args(&["a", "bc", "no"])).await.unwrap();

        assert_eq!(stub.len().await, 1);
        let first = cc.query(&stub, "read2", &args(&["ab", "c"])).await.unwrap();
        let second = cc.query(&stub, "read2", &args(&["a", "bc"])).await.unwrap();
        assert_eq!(first, second);

        let vote: Vote = record::decode(&first.unwrap()).unwrap();
        assert_eq!(vote.name, "a");
        assert_eq!(vote.vote, "no");
    }

    #[tokio::test]
    async fn test_arity_is_enforced() {
        let cc = ShareVoteChaincode::new();
        let stub = MemoryStub::new();

        let cases: &[(&str, bool, usize, usize)] = &[
            ("init", true, 1, 2),
            ("write", true, 4, 3),
            ("write2", true, 3, 4),
            ("write3", true, 4, 1),
            ("write4", true, 4, 0),
            ("read", false, 1, 2),
            ("read2", false, 2, 1),
            ("read3", false, 1, 0),
            ("read4", false, 1, 3),
        ];

        for &(function, is_invoke, expected, given) in cases {
            let supplied: Vec<String> = (0..given).map(|i| format!("a{}", i)).collect();
            let result = if is_invoke {
                cc.invoke(&stub, function, &supplied).await
            } else {
                cc.query(&stub, function, &supplied).await
            };

            match result {
                Err(ShareVoteError::IncorrectArguments { expected: e, got }) => {
                    assert_eq!(e, expected, "{}", function);
                    assert_eq!(got, given, "{}", function);
                }
                other => panic!("{}: expected arity error, got {:?}", function, other),
            }
        }

        // Nothing was written by the rejected calls
        assert_eq!(stub.len().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_functions_are_named() {
        let cc = ShareVoteChaincode::new();
        let stub = MemoryStub::new();

        let err = cc.invoke(&stub, "delete", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Received unknown function invocation: delete");

        // Read functions are not reachable through invoke and vice versa
        let err = cc.invoke(&stub, "read", &args(&["k"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Received unknown function invocation: read");

        let err = cc.query(&stub, "write", &args(&["a", "b", "c", "d"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Received unknown function query: write");
    }

    #[tokio::test]
    async fn test_read_missing_key_reports_state_error() {
        let cc = ShareVoteChaincode::new();
        let stub = MemoryStub::new();

        let err = cc.query(&stub, "read", &args(&["ghost"])).await.unwrap_err();
        assert_eq!(err.to_string(), r#"{"Error":"Failed to get state for ghost"}"#);

        let err = cc.query(&stub, "read2", &args(&["gh", "ost"])).await.unwrap_err();
        assert_eq!(err.to_string(), r#"{"Error":"Failed to get state for ghost"}"#);
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let cc = ShareVoteChaincode::new();

        let err = cc.invoke(&FailingStub, "write4", &args(&["k", "b", "u", "1"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Server error: ledger unavailable");

        let err = cc.query(&FailingStub, "read4", &args(&["k"])).await.unwrap_err();
        assert!(matches!(err, ShareVoteError::StateRead { key } if key == "k"));
    }

    #[tokio::test]
    async fn test_unescaped_quotes_are_stored_verbatim() {
        let cc = ShareVoteChaincode::new();
        let stub = MemoryStub::new();

        cc.invoke(&stub, "write3", &args(&["9", "say \"hi\"", "c", "t"])).await.unwrap();
        let value = cc.query(&stub, "read3", &args(&["9"])).await.unwrap().unwrap();

        assert_eq!(
            String::from_utf8(value.clone()).unwrap(),
            r#"{"subject__number": "9", "subject__title": "say "hi"", "subject__content": "c", "subject__type": "t"}"#
        );
        assert!(record::decode::<Subject>(&value).is_err());
    }
}
