use crate::Frame;

pub fn resp_ok() -> Frame {
    Frame::Simple("OK".to_string())
}

pub fn resp_str(val: &str) -> Frame {
    Frame::Simple(val.to_string())
}

pub fn resp_err(msg: &str) -> Frame {
    Frame::Error(msg.to_string())
}

pub fn resp_wrong_arity(cmd: &str) -> Frame {
    Frame::Error(format!("ERR wrong number of arguments for '{}'", cmd))
}

pub fn resp_not_integer() -> Frame {
    Frame::Error("ERR value is not an integer or out of range".to_string())
}

pub fn resp_syntax_error() -> Frame {
    Frame::Error("ERR syntax error".to_string())
}
