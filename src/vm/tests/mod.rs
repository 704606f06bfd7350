//! VM 模块测试

mod executor;
