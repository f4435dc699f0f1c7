/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : tensor模块测试
 */

mod save_load;
